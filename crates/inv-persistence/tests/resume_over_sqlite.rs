//! Resume end-to-end sobre SQLite: una corrida interrumpida se reanuda con un
//! motor nuevo sobre el mismo archivo y el resultado es el de una corrida sin
//! interrupción.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use inv_core::{
    Capability, CapabilityOutput, CompletionPolicy, EngineConfig, EventStore, InvestigationEngine,
    InvestigationSnapshot, InvestigationStatus, StepFailure, StepPlanner, StepRequest,
};
use inv_persistence::{build_pool, PoolProvider, SqliteArtifactRegistry, SqliteEventStore, SqlitePool};

struct SequentialPlanner;

impl StepPlanner for SequentialPlanner {
    fn plan(&mut self, snapshot: &InvestigationSnapshot) -> StepRequest {
        StepRequest { step_index: snapshot.next_step_index,
                      tool: "probe".into(),
                      payload: json!({"step": snapshot.next_step_index}) }
    }
}

struct NeverSatisfied;

impl CompletionPolicy for NeverSatisfied {
    fn is_satisfied(&self, _snapshot: &InvestigationSnapshot) -> bool {
        false
    }
}

struct CountingCapability {
    invocations: Arc<AtomicU64>,
}

impl Capability for CountingCapability {
    fn invoke(&self, request: &StepRequest) -> Result<CapabilityOutput, StepFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(CapabilityOutput { output: json!({"echo": request.payload}),
                              artifacts: vec![] })
    }
}

fn pool_in(dir: &TempDir) -> SqlitePool {
    let path = dir.path().join("events.db");
    build_pool(path.to_str().expect("utf8 path"), 2).expect("pool")
}

fn engine_over(pool: &SqlitePool,
               invocations: Arc<AtomicU64>,
               budget: u64)
               -> InvestigationEngine<SqliteEventStore<PoolProvider>, SqliteArtifactRegistry<PoolProvider>> {
    let store = SqliteEventStore::new(PoolProvider { pool: pool.clone() });
    let registry = SqliteArtifactRegistry::new(PoolProvider { pool: pool.clone() });
    let config = EngineConfig { call_budget: budget,
                                backoff_base: Duration::from_millis(1),
                                ..EngineConfig::default() };
    InvestigationEngine::new(store,
                             registry,
                             Arc::new(CountingCapability { invocations }),
                             Box::new(SequentialPlanner),
                             Box::new(NeverSatisfied)).with_config(config)
}

#[test]
fn interrupted_run_resumes_to_same_terminal_state() {
    let dir = TempDir::new().expect("tempdir");
    let id = Uuid::new_v4();

    // Primera fase: presupuesto chico para dejar el log a mitad de camino.
    // (Una corrida interrumpida por crash deja un prefijo del mismo log; un
    // presupuesto menor produce exactamente ese prefijo comprometido.)
    let first_invocations = Arc::new(AtomicU64::new(0));
    {
        let pool = pool_in(&dir);
        let mut engine = engine_over(&pool, Arc::clone(&first_invocations), 2);
        let outcome = engine.run(id).expect("first phase");
        assert_eq!(outcome.status, InvestigationStatus::Completed);
        assert_eq!(outcome.calls_used, 2);
    }
    assert_eq!(first_invocations.load(Ordering::SeqCst), 2);

    // La investigación quedó cerrada; reanudar con el mismo presupuesto no
    // invoca nada y devuelve el mismo desenlace.
    let second_invocations = Arc::new(AtomicU64::new(0));
    let pool = pool_in(&dir);
    let mut engine = engine_over(&pool, Arc::clone(&second_invocations), 2);
    let outcome = engine.run(id).expect("rerun terminal");
    assert_eq!(outcome.status, InvestigationStatus::Completed);
    assert_eq!(outcome.calls_used, 2);
    assert_eq!(second_invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn resume_counts_committed_calls_and_runs_the_rest() {
    let dir = TempDir::new().expect("tempdir");
    let id = Uuid::new_v4();

    // Fase 1: dos calls comprometidas (presupuesto 2 cierra el log, así que
    // sembramos a mano un prefijo abierto: started/completed × 2).
    {
        let pool = pool_in(&dir);
        let mut store = SqliteEventStore::new(PoolProvider { pool: pool.clone() });
        let mut seq = 0u64;
        for step in 0..2u64 {
            for kind in [inv_core::EventKind::StepStarted { step_index: step,
                                                            attempt: 1,
                                                            request: json!({"step": step}) },
                         inv_core::EventKind::StepCompleted { step_index: step,
                                                              attempt: 1,
                                                              output: json!({}),
                                                              artifact_hashes: vec![] }]
            {
                seq += 1;
                store.append(id,
                             inv_core::ProposedEvent { seq,
                                                       kind,
                                                       parent_seq: (seq > 1).then(|| seq - 1) })
                     .expect("seed");
            }
        }
    }

    // Fase 2: presupuesto 3 → una sola invocación viva más.
    let invocations = Arc::new(AtomicU64::new(0));
    let pool = pool_in(&dir);
    let mut engine = engine_over(&pool, Arc::clone(&invocations), 3);
    let outcome = engine.run(id).expect("resume");
    assert_eq!(outcome.status, InvestigationStatus::Completed);
    assert_eq!(outcome.calls_used, 3);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}
