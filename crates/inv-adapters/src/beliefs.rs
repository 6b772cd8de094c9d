//! Estado de creencias sobre candidatos, acumulado de las mediciones.
//!
//! Derivado puro de los eventos observados: se reconstruye al reanudar
//! re-observando el log completo, así que nunca se persiste por separado.

use std::collections::BTreeMap;

/// Restricciones de aceptación de un candidato.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub stability_min: f64,
    pub bandgap_min: f64,
    pub bandgap_max: f64,
    /// Bandgap ideal; la distancia a este valor penaliza el score.
    pub target_bandgap: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self { stability_min: -1.2,
               bandgap_min: 1.0,
               bandgap_max: 2.0,
               target_bandgap: 1.5 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateBelief {
    pub stability: Option<f64>,
    pub bandgap: Option<f64>,
    /// Peso de la evidencia; decae por ronda para favorecer mediciones
    /// recientes al rankear.
    pub confidence: f64,
}

impl CandidateBelief {
    /// Score de ranking: estabilidad menos distancia al bandgap objetivo,
    /// ponderado por confianza. `None` hasta tener ambas propiedades.
    pub fn score(&self, constraints: &Constraints) -> Option<f64> {
        let stability = self.stability?;
        let bandgap = self.bandgap?;
        Some(self.confidence * (stability - (bandgap - constraints.target_bandgap).abs()))
    }

    pub fn satisfies(&self, constraints: &Constraints) -> bool {
        matches!((self.stability, self.bandgap),
                 (Some(s), Some(b))
                 if s >= constraints.stability_min
                    && b >= constraints.bandgap_min
                    && b <= constraints.bandgap_max)
    }
}

/// Creencias por candidato. BTreeMap para iteración determinista.
#[derive(Debug, Clone, Default)]
pub struct BeliefState {
    candidates: BTreeMap<String, CandidateBelief>,
}

/// Factor de decaimiento de confianza por ronda de mediciones.
pub const CONFIDENCE_DECAY: f64 = 0.98;

impl BeliefState {
    /// Registra una medición. La primera observación de un candidato arranca
    /// con confianza 1.0.
    pub fn record(&mut self, candidate: &str, property: &str, value: f64) {
        let belief = self.candidates.entry(candidate.to_string()).or_insert(CandidateBelief { stability: None,
                                                                                              bandgap: None,
                                                                                              confidence: 1.0 });
        match property {
            "stability" => belief.stability = Some(value),
            "bandgap" => belief.bandgap = Some(value),
            _ => {} // propiedad desconocida: se ignora sin invalidar el resto
        }
    }

    /// Cierra una ronda de mediciones: decae la confianza de todos los
    /// candidatos ya vistos.
    pub fn end_round(&mut self) {
        for belief in self.candidates.values_mut() {
            belief.confidence *= CONFIDENCE_DECAY;
        }
    }

    /// Mejor candidato por score, si alguno tiene ambas propiedades.
    pub fn best(&self, constraints: &Constraints) -> Option<(&str, f64)> {
        self.candidates
            .iter()
            .filter_map(|(name, belief)| belief.score(constraints).map(|s| (name.as_str(), s)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Primer candidato que cumple todas las restricciones.
    pub fn satisfying_candidate(&self, constraints: &Constraints) -> Option<&str> {
        self.candidates
            .iter()
            .find(|(_, belief)| belief.satisfies(constraints))
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
