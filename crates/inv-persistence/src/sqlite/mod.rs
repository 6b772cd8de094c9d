//! Implementaciones SQLite (Diesel) de los traits del core.
//!
//! Garantías:
//! - `append` compromete el evento dentro de una transacción `IMMEDIATE`
//!   (chequeo de terminal + chequeo de seq + insert, todo o nada); no retorna
//!   Ok hasta que la fila está fijada en el archivo.
//! - WAL + busy_timeout en cada conexión (customizer del pool r2d2).
//! - El UNIQUE (investigation_id, seq) del esquema respalda el lock optimista
//!   incluso ante escritores en procesos distintos.
//! - Errores transitorios (database busy/locked, pool) se reintentan con
//!   backoff corto en `append`/lecturas.

use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use inv_core::hashing::{hash_value, to_canonical_json};
use inv_core::{Artifact, ArtifactRegistry, EngineError, Event, EventKind, EventStore, ProposedEvent};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{artifacts, event_log};

/// Pool r2d2 de conexiones SQLite.
pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Proveedor abstracto de conexiones (inyectable en tests).
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self)
                  -> Result<r2d2::PooledConnection<ConnectionManager<SqliteConnection>>, PersistenceError>;
}

/// Implementación de provider a partir de un pool r2d2.
pub struct PoolProvider {
    pub pool: SqlitePool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self)
                  -> Result<r2d2::PooledConnection<ConnectionManager<SqliteConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Pragmas por conexión: WAL para durabilidad con lectores concurrentes,
/// busy_timeout para escritores que compiten por el lock del archivo.
#[derive(Debug)]
struct ConnectionSetup;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionSetup {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; \
                            PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(r2d2::Error::QueryError)
    }
}

/// Fila para insertar en `event_log` (el `id` lo asigna SQLite).
#[derive(Insertable, Debug)]
#[diesel(table_name = event_log)]
struct NewEventRow<'a> {
    investigation_id: &'a str,
    seq: i64,
    ts: &'a str,
    event_type: &'a str,
    parent_seq: Option<i64>,
    payload: &'a str,
}

/// Fila mapeada de `event_log` para lecturas (orden = columnas del esquema).
#[derive(Queryable, Debug)]
struct EventRow {
    #[allow(dead_code)]
    id: i64,
    #[allow(dead_code)]
    investigation_id: String,
    seq: i64,
    ts: String,
    #[allow(dead_code)]
    event_type: String,
    parent_seq: Option<i64>,
    payload: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = artifacts)]
struct NewArtifactRow<'a> {
    artifact_hash: &'a str,
    kind: &'a str,
    size: i64,
    payload: &'a str,
    investigation_id: &'a str,
    produced_in_seq: i64,
}

#[derive(Queryable, Debug)]
struct ArtifactRow {
    artifact_hash: String,
    kind: String,
    size: i64,
    payload: String,
    investigation_id: String,
    produced_in_seq: i64,
}

/// Error interno de una unidad de trabajo: distingue violaciones del contrato
/// del motor (no reintenables) de fallos de base/pool.
enum TxError {
    Engine(EngineError),
    Db(PersistenceError),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        TxError::Db(PersistenceError::from(e))
    }
}

fn is_retryable(e: &PersistenceError) -> bool {
    matches!(e, PersistenceError::Busy | PersistenceError::TransientIo(_))
}

/// Retry con backoff corto para errores transitorios de SQLite/pool.
/// Los errores del contrato (`Conflict`, `ClosedInvestigation`, corrupción)
/// pasan directo al caller.
fn with_retry<F, T>(mut f: F) -> Result<T, EngineError>
    where F: FnMut() -> Result<T, TxError>
{
    let mut attempts = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(TxError::Db(e)) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * (attempts as u64 + 1);
                warn!("retryable db error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            Err(TxError::Db(e)) => return Err(EngineError::from(e)),
            Err(TxError::Engine(e)) => return Err(e),
        }
    }
}

fn decode_event_row(investigation_id: Uuid, row: EventRow) -> Result<Event, EngineError> {
    let kind: EventKind = serde_json::from_str(&row.payload)
        .map_err(|e| EngineError::Corruption(format!("undecodable event payload at seq {}: {e}", row.seq)))?;
    let ts: DateTime<Utc> =
        DateTime::parse_from_rfc3339(&row.ts).map(|d| d.with_timezone(&Utc))
                                             .map_err(|e| {
                                                 EngineError::Corruption(format!("invalid timestamp at seq {}: {e}",
                                                                                 row.seq))
                                             })?;
    Ok(Event { seq: row.seq as u64,
               investigation_id,
               kind,
               ts,
               parent_seq: row.parent_seq.map(|s| s as u64) })
}

/// Implementación SQLite del `EventStore` (append-only).
pub struct SqliteEventStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> SqliteEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventStore for SqliteEventStore<P> {
    fn append(&mut self, investigation_id: Uuid, proposed: ProposedEvent) -> Result<Event, EngineError> {
        let id_str = investigation_id.to_string();
        let event_type = proposed.kind.type_name();
        let payload = serde_json::to_string(&proposed.kind)
            .map_err(|e| EngineError::Internal(format!("serialize event kind: {e}")))?;
        let ts = Utc::now();
        let ts_str = ts.to_rfc3339();
        debug!("append:start investigation={id_str} seq={} kind={event_type}", proposed.seq);

        with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Db)?;
            conn.immediate_transaction::<_, TxError, _>(|tx| {
                // Último evento comprometido: fija la regla de secuencia y el
                // cierre por kind terminal.
                let last: Option<(i64, String)> =
                    event_log::table.filter(event_log::investigation_id.eq(&id_str))
                                    .order(event_log::seq.desc())
                                    .select((event_log::seq, event_log::payload))
                                    .first(tx)
                                    .optional()?;
                let last_seq = match last {
                    Some((seq, last_payload)) => {
                        let last_kind: EventKind = serde_json::from_str(&last_payload).map_err(|e| {
                            TxError::Engine(EngineError::Corruption(format!("undecodable event payload at seq {seq}: {e}")))
                        })?;
                        if last_kind.is_terminal() {
                            return Err(TxError::Engine(EngineError::ClosedInvestigation));
                        }
                        seq as u64
                    }
                    None => 0,
                };
                if proposed.seq != last_seq + 1 {
                    return Err(TxError::Engine(EngineError::Conflict { proposed: proposed.seq,
                                                                       expected: last_seq + 1 }));
                }
                diesel::insert_into(event_log::table).values(NewEventRow { investigation_id: &id_str,
                                                                           seq: proposed.seq as i64,
                                                                           ts: &ts_str,
                                                                           event_type,
                                                                           parent_seq:
                                                                               proposed.parent_seq
                                                                                       .map(|s| s as i64),
                                                                           payload: &payload })
                                                     .execute(tx)?;
                Ok(())
            })
        })?;

        debug!("append:done investigation={id_str} seq={}", proposed.seq);
        Ok(Event { seq: proposed.seq,
                   investigation_id,
                   kind: proposed.kind,
                   ts,
                   parent_seq: proposed.parent_seq })
    }

    fn read_all(&self, investigation_id: Uuid) -> Result<Vec<Event>, EngineError> {
        let id_str = investigation_id.to_string();
        debug!("read_all:start investigation={id_str}");
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Db)?;
            event_log::table.filter(event_log::investigation_id.eq(&id_str))
                            .order(event_log::seq.asc())
                            .load(&mut conn)
                            .map_err(TxError::from)
        })?;
        debug!("read_all:done investigation={id_str} count={}", rows.len());
        rows.into_iter()
            .map(|row| decode_event_row(investigation_id, row))
            .collect()
    }
}

/// Implementación SQLite del `ArtifactRegistry`.
///
/// Dedup por PK (`artifact_hash`): un `put` con contenido ya registrado
/// devuelve la fila existente sin escribir (conserva el evento productor
/// original).
pub struct SqliteArtifactRegistry<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> SqliteArtifactRegistry<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Cantidad de filas registradas (para verificar dedup en tests).
    pub fn count(&self) -> Result<i64, EngineError> {
        with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Db)?;
            artifacts::table.count().get_result(&mut conn).map_err(TxError::from)
        })
    }
}

fn decode_artifact_row(row: ArtifactRow) -> Result<Artifact, EngineError> {
    let payload: Value = serde_json::from_str(&row.payload)
        .map_err(|e| EngineError::Corruption(format!("undecodable artifact {}: {e}", row.artifact_hash)))?;
    let investigation_id = Uuid::parse_str(&row.investigation_id)
        .map_err(|e| EngineError::Corruption(format!("invalid investigation id on artifact {}: {e}",
                                                     row.artifact_hash)))?;
    Ok(Artifact { hash: row.artifact_hash,
                  kind: row.kind,
                  size: row.size as u64,
                  investigation_id,
                  produced_in_seq: row.produced_in_seq as u64,
                  payload })
}

impl<P: ConnectionProvider> ArtifactRegistry for SqliteArtifactRegistry<P> {
    fn put(&mut self,
           investigation_id: Uuid,
           produced_in_seq: u64,
           kind: &str,
           payload: &Value)
           -> Result<Artifact, EngineError> {
        let canonical = to_canonical_json(payload);
        let hash = hash_value(payload);
        let id_str = investigation_id.to_string();
        let row = with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Db)?;
            let existing: Option<ArtifactRow> = artifacts::table.filter(artifacts::artifact_hash.eq(&hash))
                                                                .first(&mut conn)
                                                                .optional()?;
            if let Some(found) = existing {
                return Ok(found);
            }
            diesel::insert_or_ignore_into(artifacts::table).values(NewArtifactRow { artifact_hash: &hash,
                                                                                    kind,
                                                                                    size: canonical.len() as i64,
                                                                                    payload: &canonical,
                                                                                    investigation_id: &id_str,
                                                                                    produced_in_seq:
                                                                                        produced_in_seq as i64 })
                                                           .execute(&mut conn)?;
            artifacts::table.filter(artifacts::artifact_hash.eq(&hash))
                            .first(&mut conn)
                            .map_err(TxError::from)
        })?;
        decode_artifact_row(row)
    }

    fn get(&self, hash: &str) -> Result<Value, EngineError> {
        let row: Option<ArtifactRow> = with_retry(|| {
            let mut conn = self.provider.connection().map_err(TxError::Db)?;
            artifacts::table.filter(artifacts::artifact_hash.eq(hash))
                            .first(&mut conn)
                            .optional()
                            .map_err(TxError::from)
        })?;
        match row {
            Some(found) => decode_artifact_row(found).map(|a| a.payload),
            None => Err(EngineError::ArtifactNotFound(hash.to_string())),
        }
    }
}

/// Construye un pool SQLite con pragmas y migraciones aplicadas.
///
/// Crea el directorio padre del archivo si no existe (convención de la capa
/// de invocación: `runs/events.db`).
pub fn build_pool(db_path: &str, max_size: u32) -> Result<SqlitePool, PersistenceError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::TransientIo(format!("create db dir: {e}")))?;
        }
    }
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = r2d2::Pool::builder().max_size(max_size.max(1))
                                    .connection_customizer(Box::new(ConnectionSetup))
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    // Migraciones una sola vez al construir (primer checkout del pool).
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración y construye un pool
/// ya migrado.
pub fn build_dev_pool_from_env() -> Result<SqlitePool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = DbConfig::from_env();
    build_pool(&cfg.path, cfg.max_connections)
}
