//! Errores de persistencia.
//! Mapea errores de Diesel / pool a variantes semánticas, y éstas a
//! `EngineError` en la frontera con los traits del core.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use inv_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("not found")]
    NotFound,
    #[error("database is busy/locked (retryable)")]
    Busy,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(message),
                    DatabaseErrorKind::CheckViolation => Self::CheckViolation(message),
                    _ if message.to_lowercase().contains("locked") || message.to_lowercase().contains("busy") => {
                        Self::Busy
                    }
                    other => Self::Unknown(format!("db error kind {:?}: {}", other, message)),
                }
            }
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<PersistenceError> for EngineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound => EngineError::Internal("row not found".into()),
            other => EngineError::Storage(other.to_string()),
        }
    }
}
