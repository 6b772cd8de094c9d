//! Oráculo sintético: capability determinista para campañas reproducibles.
//!
//! Las mediciones se derivan del hash de `(seed, candidato, propiedad)`, así
//! que dos corridas con el mismo seed observan exactamente los mismos valores
//! sin tocar ningún backend real. Los fallos inyectados varían por invocación
//! (no por contenido) para que un retry pueda suceder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use inv_core::hashing::hash_str;
use inv_core::{ArtifactDraft, Capability, CapabilityOutput, StepFailure, StepRequest};

/// Rango sintético de estabilidad (eV/átomo relativo al hull).
const STABILITY_RANGE: (f64, f64) = (-2.0, 0.0);
/// Rango sintético de bandgap (eV).
const BANDGAP_RANGE: (f64, f64) = (0.5, 3.0);

pub struct SyntheticOracle {
    seed: u64,
    /// Probabilidad de fallo recuperable por invocación, en [0, 1].
    failure_rate: f64,
    /// Latencia simulada por invocación (para ejercitar deadlines).
    latency: Option<Duration>,
    invocations: AtomicU64,
}

#[derive(Deserialize)]
struct MeasureRequest {
    property: String,
    candidates: Vec<String>,
}

fn unit_fraction(input: &str) -> f64 {
    let digest = hash_str(input);
    u64::from_str_radix(&digest[..16], 16).map(|v| v as f64 / u64::MAX as f64)
                                          .unwrap_or(0.0)
}

fn scale(fraction: f64, (lo, hi): (f64, f64)) -> f64 {
    lo + fraction * (hi - lo)
}

impl SyntheticOracle {
    pub fn new(seed: u64) -> Self {
        Self { seed,
               failure_rate: 0.0,
               latency: None,
               invocations: AtomicU64::new(0) }
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Valor determinista de una propiedad para un candidato bajo este seed.
    pub fn measure(&self, candidate: &str, property: &str) -> Result<f64, StepFailure> {
        let fraction = unit_fraction(&format!("{}:{candidate}:{property}", self.seed));
        match property {
            "stability" => Ok(scale(fraction, STABILITY_RANGE)),
            "bandgap" => Ok(scale(fraction, BANDGAP_RANGE)),
            other => Err(StepFailure::Fatal(format!("unknown property: {other}"))),
        }
    }
}

impl Capability for SyntheticOracle {
    fn invoke(&self, request: &StepRequest) -> Result<CapabilityOutput, StepFailure> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if request.tool != "oracle.measure" {
            return Err(StepFailure::Fatal(format!("unknown tool: {}", request.tool)));
        }
        let measure: MeasureRequest = serde_json::from_value(request.payload.clone())
            .map_err(|e| StepFailure::Fatal(format!("malformed measure request: {e}")))?;

        // El dado de fallo depende del número de invocación, no del
        // contenido: un retry del mismo request puede pasar.
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.failure_rate > 0.0 {
            let roll = unit_fraction(&format!("fail:{}:{invocation}", self.seed));
            if roll < self.failure_rate {
                return Err(StepFailure::Recoverable(format!("synthetic oracle fault on invocation {invocation}")));
            }
        }

        let mut rows = Vec::with_capacity(measure.candidates.len());
        for candidate in &measure.candidates {
            let value = self.measure(candidate, &measure.property)?;
            rows.push(json!({"candidate": candidate, "value": value}));
        }
        let dataset = json!({
            "property": measure.property,
            "seed": self.seed,
            "rows": rows,
        });
        Ok(CapabilityOutput { output: json!({"property": measure.property, "rows": rows}),
                              artifacts: vec![ArtifactDraft { kind: "dataset".into(),
                                                              payload: dataset }] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure_request(property: &str, candidates: &[&str]) -> StepRequest {
        StepRequest { step_index: 0,
                      tool: "oracle.measure".into(),
                      payload: json!({"property": property, "candidates": candidates}) }
    }

    #[test]
    fn measurements_are_deterministic_per_seed() {
        let oracle = SyntheticOracle::new(42);
        let again = SyntheticOracle::new(42);
        let a = oracle.invoke(&measure_request("bandgap", &["mat-001", "mat-002"])).expect("invoke");
        let b = again.invoke(&measure_request("bandgap", &["mat-001", "mat-002"])).expect("invoke");
        assert_eq!(a.output, b.output);
    }

    #[test]
    fn distinct_seeds_observe_distinct_values() {
        let a = SyntheticOracle::new(1).measure("mat-001", "stability").expect("measure");
        let b = SyntheticOracle::new(2).measure("mat-001", "stability").expect("measure");
        assert_ne!(a, b);
    }

    #[test]
    fn values_fall_in_declared_ranges() {
        let oracle = SyntheticOracle::new(7);
        for i in 0..20 {
            let name = format!("mat-{i:03}");
            let s = oracle.measure(&name, "stability").expect("stability");
            let b = oracle.measure(&name, "bandgap").expect("bandgap");
            assert!((-2.0..=0.0).contains(&s), "stability {s} fuera de rango");
            assert!((0.5..=3.0).contains(&b), "bandgap {b} fuera de rango");
        }
    }

    #[test]
    fn unknown_tool_is_fatal() {
        let oracle = SyntheticOracle::new(1);
        let request = StepRequest { step_index: 0,
                                    tool: "oracle.synthesize".into(),
                                    payload: json!({}) };
        let err = oracle.invoke(&request).unwrap_err();
        assert!(matches!(err, StepFailure::Fatal(_)));
    }

    #[test]
    fn full_failure_rate_yields_recoverable_fault() {
        let oracle = SyntheticOracle::new(9).with_failure_rate(1.0);
        let err = oracle.invoke(&measure_request("bandgap", &["mat-001"])).unwrap_err();
        assert!(matches!(err, StepFailure::Recoverable(_)));
        assert!(err.is_retryable());
    }
}
