//! Errores del motor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum EngineError {
    /// Carrera de escritura optimista: el seq propuesto no es `last + 1`.
    /// Siempre se reintenta internamente (re-read y re-append).
    #[error("sequence conflict: proposed {proposed}, expected {expected}")]
    Conflict { proposed: u64, expected: u64 },
    /// Intento de escribir sobre una investigación con evento terminal.
    #[error("investigation is closed (terminal event already committed)")]
    ClosedInvestigation,
    /// Invariante violado en el log almacenado (gaps, cola post-terminal).
    #[error("event log corruption: {0}")]
    Corruption(String),
    /// Fallo de IO del registro de artifacts.
    #[error("artifact storage failure: {0}")]
    Storage(String),
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}
