//! Tipos de evento y estructura `Event`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::step::StepFailure;

/// Razón de cierre de una investigación completada.
///
/// Desempate: si en una misma iteración coinciden presupuesto agotado
/// y señal de la policy, gana `BudgetExhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    BudgetExhausted,
    GoalSatisfied,
}

/// Tipos de eventos soportados por el motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Un intento de step comenzó. No implica éxito; un `StepStarted` sin
    /// evento de cierre es un intento perdido (crash) y no cuenta como call.
    StepStarted { step_index: u64, attempt: u32, request: Value },
    /// Un intento terminó correctamente, con su output y los hashes de los
    /// artifacts producidos.
    StepCompleted {
        step_index: u64,
        attempt: u32,
        output: Value,
        artifact_hashes: Vec<String>,
    },
    /// Un intento falló. `retryable = false` es terminal para la
    /// investigación (estado `Failed`); no existe un kind dedicado de fallo.
    StepFailed {
        step_index: u64,
        attempt: u32,
        failure: StepFailure,
        retryable: bool,
    },
    /// Un artifact quedó registrado. Se emite ANTES de fijar el contenido en
    /// el registry (orden write-through).
    ArtifactProduced { hash: String, kind: String, size: u64 },
    /// Cierre normal: presupuesto agotado o policy satisfecha.
    InvestigationCompleted { reason: CompletionReason, calls_used: u64 },
    /// Cancelación cooperativa externa.
    InvestigationAborted { reason: String, calls_used: u64 },
}

impl EventKind {
    /// Un kind terminal prohíbe cualquier append posterior para ese id.
    pub fn is_terminal(&self) -> bool {
        matches!(self,
                 EventKind::InvestigationCompleted { .. }
                 | EventKind::InvestigationAborted { .. }
                 | EventKind::StepFailed { retryable: false, .. })
    }

    /// Nombre estable en minúsculas para índices/constraints de storage.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::StepStarted { .. } => "step_started",
            EventKind::StepCompleted { .. } => "step_completed",
            EventKind::StepFailed { .. } => "step_failed",
            EventKind::ArtifactProduced { .. } => "artifact_produced",
            EventKind::InvestigationCompleted { .. } => "investigation_completed",
            EventKind::InvestigationAborted { .. } => "investigation_aborted",
        }
    }
}

/// Evento comprometido en el log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotónico y sin gaps dentro de una investigación; arranca en 1.
    pub seq: u64,
    pub investigation_id: Uuid,
    pub kind: EventKind,
    pub ts: DateTime<Utc>, // metadato (asignado al commit)
    /// Padre causal opcional (normalmente el evento anterior).
    pub parent_seq: Option<u64>,
}

/// Propuesta de append: el caller fija el seq esperado y el store lo valida
/// (lock optimista).
#[derive(Debug, Clone)]
pub struct ProposedEvent {
    pub seq: u64,
    pub kind: EventKind,
    pub parent_seq: Option<u64>,
}
