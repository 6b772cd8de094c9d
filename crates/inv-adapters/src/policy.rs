//! Policy de corte por restricciones.

use std::sync::{Arc, Mutex};

use inv_core::{CompletionPolicy, InvestigationSnapshot};

use crate::beliefs::{BeliefState, Constraints};

/// Declara la investigación satisfecha cuando algún candidato cumple todas
/// las restricciones. Comparte el estado de creencias con el planner.
pub struct ConstraintPolicy {
    beliefs: Arc<Mutex<BeliefState>>,
    constraints: Constraints,
}

impl ConstraintPolicy {
    pub fn new(beliefs: Arc<Mutex<BeliefState>>, constraints: Constraints) -> Self {
        Self { beliefs, constraints }
    }
}

impl CompletionPolicy for ConstraintPolicy {
    fn is_satisfied(&self, _snapshot: &InvestigationSnapshot) -> bool {
        self.beliefs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .satisfying_candidate(&self.constraints)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inv_core::InvestigationSnapshot;
    use uuid::Uuid;

    #[test]
    fn unsatisfied_until_a_candidate_meets_constraints() {
        let beliefs = Arc::new(Mutex::new(BeliefState::default()));
        let policy = ConstraintPolicy::new(Arc::clone(&beliefs), Constraints::default());
        let snapshot = InvestigationSnapshot::new(Uuid::new_v4());

        assert!(!policy.is_satisfied(&snapshot));
        {
            let mut guard = beliefs.lock().expect("lock");
            guard.record("mat-010", "stability", -0.3);
            guard.record("mat-010", "bandgap", 1.2);
        }
        assert!(policy.is_satisfied(&snapshot));
    }
}
