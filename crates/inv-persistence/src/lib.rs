//! inv-persistence
//!
//! Implementaciones durables (SQLite vía Diesel) de los traits del core:
//! `EventStore` y `ArtifactRegistry`. Objetivo: paridad 1:1 con los backends
//! en memoria — el replay de un log persistido reconstruye exactamente el
//! mismo estado — más durabilidad entre reinicios de proceso (WAL, commits
//! transaccionales).
//!
//! Módulos:
//! - `sqlite`: stores sobre el archivo SQLite (event_log y artifacts).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use sqlite::{build_dev_pool_from_env, build_pool, ConnectionProvider, PoolProvider, SqliteArtifactRegistry,
                 SqliteEventStore, SqlitePool};
