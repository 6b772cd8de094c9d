//! Corridas end-to-end de la campaña de materiales sobre backends en memoria.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use inv_adapters::{Constraints, ConstraintPolicy, MaterialsPlanner, SyntheticOracle};
use inv_core::{
    CompletionReason, EngineConfig, EventKind, InMemoryArtifactRegistry, InMemoryEventStore,
    InvestigationEngine, InvestigationStatus, StepFailure,
};

fn engine_for(seed: u64,
              constraints: Constraints,
              failure_rate: f64,
              budget: u64)
              -> InvestigationEngine<InMemoryEventStore, InMemoryArtifactRegistry> {
    let planner = MaterialsPlanner::new(seed, constraints.clone());
    let policy = ConstraintPolicy::new(planner.beliefs(), constraints);
    let oracle = SyntheticOracle::new(seed).with_failure_rate(failure_rate);
    let config = EngineConfig { call_budget: budget,
                                backoff_base: Duration::from_millis(1),
                                ..EngineConfig::default() };
    InvestigationEngine::new(InMemoryEventStore::default(),
                             InMemoryArtifactRegistry::default(),
                             Arc::new(oracle),
                             Box::new(planner),
                             Box::new(policy)).with_config(config)
}

fn loose_constraints() -> Constraints {
    // Cualquier medición del oráculo cae dentro de estos rangos.
    Constraints { stability_min: -2.0,
                  bandgap_min: 0.5,
                  bandgap_max: 3.0,
                  target_bandgap: 1.5 }
}

fn impossible_constraints() -> Constraints {
    // La estabilidad sintética nunca supera 0.0.
    Constraints { stability_min: 1.0, ..Constraints::default() }
}

#[test]
fn loose_constraints_close_with_goal_satisfied() {
    let mut engine = engine_for(42, loose_constraints(), 0.0, 10);
    let id = Uuid::new_v4();
    let outcome = engine.run(id).expect("run");

    assert_eq!(outcome.status, InvestigationStatus::Completed);
    // Un step por propiedad alcanza: todo candidato medido satisface.
    assert_eq!(outcome.calls_used, 2);

    let events = engine.events_for(id).expect("events");
    let last = events.last().expect("terminal event");
    assert!(matches!(last.kind,
                     EventKind::InvestigationCompleted { reason: CompletionReason::GoalSatisfied,
                                                         calls_used: 2 }));
    // Cada step produjo su dataset como artifact recuperable.
    let produced: Vec<&str> = events.iter()
                                    .filter_map(|e| match &e.kind {
                                        EventKind::ArtifactProduced { hash, .. } => Some(hash.as_str()),
                                        _ => None,
                                    })
                                    .collect();
    assert_eq!(produced.len(), 2);
    for hash in produced {
        let dataset = engine.artifact(hash).expect("artifact");
        assert!(dataset["rows"].is_array());
    }
}

#[test]
fn impossible_constraints_exhaust_the_budget() {
    let mut engine = engine_for(42, impossible_constraints(), 0.0, 4);
    let id = Uuid::new_v4();
    let outcome = engine.run(id).expect("run");

    assert_eq!(outcome.status, InvestigationStatus::Completed);
    assert_eq!(outcome.calls_used, 4);
    let events = engine.events_for(id).expect("events");
    assert!(matches!(events.last().expect("terminal").kind,
                     EventKind::InvestigationCompleted { reason: CompletionReason::BudgetExhausted,
                                                         calls_used: 4 }));
}

#[test]
fn always_failing_oracle_exhausts_retries_into_failed() {
    let mut engine = engine_for(9, loose_constraints(), 1.0, 10);
    let id = Uuid::new_v4();
    let outcome = engine.run(id).expect("run");

    assert_eq!(outcome.status, InvestigationStatus::Failed);
    // intento inicial + max_retries, todos fallidos
    assert_eq!(outcome.calls_used, 4);
    let events = engine.events_for(id).expect("events");
    let retry_flags: Vec<bool> = events.iter()
                                       .filter_map(|e| match &e.kind {
                                           EventKind::StepFailed { retryable, .. } => Some(*retryable),
                                           _ => None,
                                       })
                                       .collect();
    assert_eq!(retry_flags, vec![true, true, true, false]);
}

#[test]
fn slow_oracle_times_out_and_exhausts_retries() {
    // Oráculo más lento que el deadline por step: cada intento expira como
    // timeout recuperable hasta agotar los reintentos.
    let constraints = loose_constraints();
    let planner = MaterialsPlanner::new(3, constraints.clone());
    let policy = ConstraintPolicy::new(planner.beliefs(), constraints);
    let oracle = SyntheticOracle::new(3).with_latency(Duration::from_millis(100));
    let config = EngineConfig { call_budget: 10,
                                max_retries: 2,
                                backoff_base: Duration::from_millis(1),
                                step_deadline: Duration::from_millis(10) };
    let mut engine = InvestigationEngine::new(InMemoryEventStore::default(),
                                              InMemoryArtifactRegistry::default(),
                                              Arc::new(oracle),
                                              Box::new(planner),
                                              Box::new(policy)).with_config(config);
    let id = Uuid::new_v4();
    let outcome = engine.run(id).expect("run");

    assert_eq!(outcome.status, InvestigationStatus::Failed);
    // intento inicial + 2 reintentos, todos expirados
    assert_eq!(outcome.calls_used, 3);
    let events = engine.events_for(id).expect("events");
    let timeouts = events.iter()
                         .filter(|e| {
                             matches!(&e.kind,
                                      EventKind::StepFailed { failure: StepFailure::Timeout { .. }, .. })
                         })
                         .count();
    assert_eq!(timeouts, 3);
}

#[test]
fn same_seed_reproduces_identical_artifacts() {
    let id_a = Uuid::new_v4();
    let id_b = Uuid::new_v4();
    let mut engine_a = engine_for(7, impossible_constraints(), 0.0, 3);
    let mut engine_b = engine_for(7, impossible_constraints(), 0.0, 3);
    engine_a.run(id_a).expect("run a");
    engine_b.run(id_b).expect("run b");

    let hashes = |engine: &InvestigationEngine<InMemoryEventStore, InMemoryArtifactRegistry>, id: Uuid| {
        engine.events_for(id)
              .expect("events")
              .iter()
              .filter_map(|e| match &e.kind {
                  EventKind::ArtifactProduced { hash, .. } => Some(hash.clone()),
                  _ => None,
              })
              .collect::<Vec<_>>()
    };
    // Mismo seed ⇒ mismos candidatos, mismas mediciones, mismos hashes.
    assert_eq!(hashes(&engine_a, id_a), hashes(&engine_b, id_b));
}
