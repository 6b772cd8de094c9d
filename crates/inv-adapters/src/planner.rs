//! Planner de campaña: decide qué medir en cada step.
//!
//! Genera un lote de candidatos a partir del seed y alterna las propiedades a
//! medir (estabilidad en steps pares, bandgap en impares). Mantiene las
//! creencias al día observando cada `StepCompleted`; como `observe` también
//! corre durante el replay del log, reanudar reconstruye el mismo estado de
//! creencias que tenía la corrida interrumpida.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::json;

use inv_core::{Event, EventKind, InvestigationSnapshot, StepPlanner, StepRequest};

use crate::beliefs::{BeliefState, Constraints};

/// Tamaño de lote por defecto de la campaña.
pub const DEFAULT_BATCH_SIZE: usize = 12;

pub struct MaterialsPlanner {
    beliefs: Arc<Mutex<BeliefState>>,
    constraints: Constraints,
    candidates: Vec<String>,
}

#[derive(Deserialize)]
struct MeasurementRow {
    candidate: String,
    value: f64,
}

#[derive(Deserialize)]
struct StepOutput {
    property: String,
    rows: Vec<MeasurementRow>,
}

fn generate_candidates(seed: u64, batch_size: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = BTreeSet::new();
    while seen.len() < batch_size {
        seen.insert(format!("mat-{:03}", rng.gen_range(0..1000u32)));
    }
    seen.into_iter().collect()
}

impl MaterialsPlanner {
    pub fn new(seed: u64, constraints: Constraints) -> Self {
        Self::with_batch_size(seed, constraints, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(seed: u64, constraints: Constraints, batch_size: usize) -> Self {
        Self { beliefs: Arc::new(Mutex::new(BeliefState::default())),
               constraints,
               candidates: generate_candidates(seed, batch_size) }
    }

    /// Handle compartible del estado de creencias (para la policy y para
    /// inspección post-corrida).
    pub fn beliefs(&self) -> Arc<Mutex<BeliefState>> {
        Arc::clone(&self.beliefs)
    }

    fn beliefs_guard(&self) -> MutexGuard<'_, BeliefState> {
        self.beliefs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StepPlanner for MaterialsPlanner {
    fn plan(&mut self, snapshot: &InvestigationSnapshot) -> StepRequest {
        let property = if snapshot.next_step_index % 2 == 0 { "stability" } else { "bandgap" };
        let hypothesis = match self.beliefs_guard().best(&self.constraints) {
            Some((name, score)) => format!("leading candidate {name} (score {score:.3})"),
            None => "no ranked candidate yet".to_string(),
        };
        StepRequest { step_index: snapshot.next_step_index,
                      tool: "oracle.measure".into(),
                      payload: json!({
                          "property": property,
                          "candidates": self.candidates,
                          "hypothesis": hypothesis,
                      }) }
    }

    fn observe(&mut self, event: &Event) {
        if let EventKind::StepCompleted { output, .. } = &event.kind {
            // Un output que no parsea no es de este planner; se ignora.
            let Ok(parsed) = serde_json::from_value::<StepOutput>(output.clone()) else {
                return;
            };
            let mut beliefs = self.beliefs_guard();
            for row in &parsed.rows {
                beliefs.record(&row.candidate, &parsed.property, row.value);
            }
            beliefs.end_round();
        }
    }
}
