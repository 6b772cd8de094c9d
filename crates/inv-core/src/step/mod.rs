//! Steps y capabilities.
//!
//! Un step es transitorio: vive dentro de una iteración del loop y sólo se
//! persiste a través del par de eventos que produce (`StepStarted` →
//! `StepCompleted`/`StepFailed`). Este módulo define:
//! - `Capability`: backend pluggable (modelo, herramienta, análisis).
//! - `StepRequest`/`CapabilityOutput`: forma neutral de la invocación.
//! - `StepFailure` y `StepRunResult`: normalización de resultados.
//! - `StepExecutor`: invocación acotada por deadline (ver `executor`).

pub mod executor;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use executor::StepExecutor;

/// Petición de un step: qué invocar y con qué payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRequest {
    pub step_index: u64,
    /// Identificador de la operación del backend (p.ej.
    /// `oracle.query_property`).
    pub tool: String,
    pub payload: Value,
}

/// Borrador de artifact devuelto por una capability; el motor calcula el hash
/// y lo registra tras comprometer su evento `ArtifactProduced`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub kind: String,
    pub payload: Value,
}

/// Salida cruda de una capability.
#[derive(Debug, Clone)]
pub struct CapabilityOutput {
    pub output: Value,
    pub artifacts: Vec<ArtifactDraft>,
}

/// Fallos a nivel capability/step, con contrato de retryabilidad declarado.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepFailure {
    /// La invocación excedió el deadline del caller. Recuperable.
    #[error("capability timeout after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("recoverable capability failure: {0}")]
    Recoverable(String),
    #[error("fatal capability failure: {0}")]
    Fatal(String),
    /// IO del registro de artifacts; recuperable vía retry del step.
    #[error("artifact storage failure: {0}")]
    Storage(String),
}

impl StepFailure {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StepFailure::Fatal(_))
    }
}

/// Resultado normalizado de ejecutar un step (forma-evento, sin persistir).
#[derive(Debug, Clone)]
pub enum StepRunResult {
    Success { output: Value, artifacts: Vec<ArtifactDraft> },
    RecoverableFailure { failure: StepFailure },
    FatalFailure { failure: StepFailure },
}

/// Backend pluggable invocado una vez por step.
///
/// Los backends concretos se ligan al construir el motor, nunca por
/// inspección de tipos en runtime. `invoke` puede bloquear por latencia de
/// red/modelo; el executor acota la espera con el deadline del caller.
pub trait Capability: Send + Sync {
    fn invoke(&self, request: &StepRequest) -> Result<CapabilityOutput, StepFailure>;
}
