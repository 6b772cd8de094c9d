use std::sync::Arc;

use uuid::Uuid;

use inv_adapters::{Constraints, ConstraintPolicy, MaterialsPlanner, SyntheticOracle};
use inv_core::{EngineConfig, EventStore, InvestigationEngine, InvestigationStatus};
use inv_persistence::{build_dev_pool_from_env, build_pool, DbConfig, PoolProvider, SqliteArtifactRegistry,
                      SqliteEventStore, SqlitePool};

/// Pool sobre `--db` si se pasó; si no, el de `.env` (`INVESTIGATOR_DB`).
fn open_pool(db: Option<&str>) -> Result<SqlitePool, inv_persistence::PersistenceError> {
    match db {
        Some(path) => build_pool(path, DbConfig::from_env().max_connections),
        None => build_dev_pool_from_env(),
    }
}

/// Códigos de salida de `run`: 0 Completed, 2 Failed, 3 Aborted.
/// Errores de uso salen con 2; errores de setup/persistencia con 5.
fn main() {
    // Cargar .env si existe para obtener INVESTIGATOR_DB
    let _ = dotenvy::dotenv();
    // CLI mínima: `inv run --budget <N> [--seed <N>] [--id <UUID>] [--db <RUTA>]`
    //             `inv events --id <UUID> [--db <RUTA>]`
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "run" {
        let mut budget: Option<u64> = None;
        let mut seed: u64 = 0;
        let mut id: Option<Uuid> = None;
        let mut db: Option<String> = None;
        let mut i = 2;
        while i < args.len() {
            match args[i].as_str() {
                "--budget" => {
                    i += 1;
                    if i < args.len() { budget = args[i].parse::<u64>().ok(); }
                }
                "--seed" => {
                    i += 1;
                    if i < args.len() { seed = args[i].parse::<u64>().unwrap_or(0); }
                }
                "--id" => {
                    i += 1;
                    if i < args.len() { id = Uuid::parse_str(&args[i]).ok(); }
                }
                "--db" => {
                    i += 1;
                    if i < args.len() { db = Some(args[i].clone()); }
                }
                _ => {}
            }
            i += 1;
        }

        let Some(budget) = budget else {
            eprintln!("Uso: inv run --budget <N> [--seed <N>] [--id <UUID>] [--db <RUTA>]");
            std::process::exit(2);
        };
        let investigation_id = id.unwrap_or_else(Uuid::new_v4);
        let pool = match open_pool(db.as_deref()) {
            Ok(p) => p,
            Err(e) => { eprintln!("[inv run] pool error: {e}"); std::process::exit(5); }
        };

        let constraints = Constraints::default();
        let planner = MaterialsPlanner::new(seed, constraints.clone());
        let policy = ConstraintPolicy::new(planner.beliefs(), constraints);
        let oracle = SyntheticOracle::new(seed);
        let event_store = SqliteEventStore::new(PoolProvider { pool: pool.clone() });
        let registry = SqliteArtifactRegistry::new(PoolProvider { pool });
        let mut engine = InvestigationEngine::new(event_store,
                                                  registry,
                                                  Arc::new(oracle),
                                                  Box::new(planner),
                                                  Box::new(policy))
            .with_config(EngineConfig::with_budget(budget));

        match engine.run(investigation_id) {
            Ok(outcome) => {
                println!("investigation={} status={:?} calls_used={}",
                         outcome.investigation_id, outcome.status, outcome.calls_used);
                let code = match outcome.status {
                    InvestigationStatus::Completed => 0,
                    InvestigationStatus::Failed => 2,
                    InvestigationStatus::Aborted => 3,
                    // run siempre termina en estado terminal
                    InvestigationStatus::Running => 5,
                };
                std::process::exit(code);
            }
            Err(e) => { eprintln!("[inv run] error: {e}"); std::process::exit(5); }
        }
    } else if args.len() >= 2 && args[1] == "events" {
        let mut id: Option<Uuid> = None;
        let mut db: Option<String> = None;
        let mut i = 2;
        while i < args.len() {
            match args[i].as_str() {
                "--id" => {
                    i += 1;
                    if i < args.len() { id = Uuid::parse_str(&args[i]).ok(); }
                }
                "--db" => {
                    i += 1;
                    if i < args.len() { db = Some(args[i].clone()); }
                }
                _ => {}
            }
            i += 1;
        }
        let Some(investigation_id) = id else {
            eprintln!("Uso: inv events --id <UUID> [--db <RUTA>]");
            std::process::exit(2);
        };
        let pool = match open_pool(db.as_deref()) {
            Ok(p) => p,
            Err(e) => { eprintln!("[inv events] pool error: {e}"); std::process::exit(5); }
        };
        let store = SqliteEventStore::new(PoolProvider { pool });
        let events = match store.read_all(investigation_id) {
            Ok(evs) => evs,
            Err(e) => { eprintln!("[inv events] error: {e}"); std::process::exit(5); }
        };
        if events.is_empty() {
            eprintln!("[inv events] investigación no encontrada: {investigation_id}");
            std::process::exit(4);
        }
        for event in &events {
            let payload = serde_json::to_string(&event.kind).unwrap_or_else(|_| "<unprintable>".into());
            println!("{:>4}  {}  {}  {}", event.seq, event.ts.to_rfc3339(), event.kind.type_name(), payload);
        }
        std::process::exit(0);
    } else {
        println!("inv-cli: use 'run' or 'events' subcommands");
    }
}
