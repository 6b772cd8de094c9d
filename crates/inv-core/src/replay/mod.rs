//! Resume/Recovery: reconstrucción de estado por fold sobre el log.
//!
//! No guarda estado propio: `replay` es una reducción pura izquierda-derecha
//! sobre los eventos leídos del `EventStore`, por lo tanto trivialmente
//! re-ejecutable. El loop en vivo aplica la MISMA función `apply` por evento
//! comprometido, de modo que el estado tras un crash + resume es idéntico por
//! construcción al de una corrida sin crash.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::event::{CompletionReason, Event, EventKind};

/// Estados del ciclo de vida. `Running` es el único no terminal una
/// vez que existe al menos un evento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Running,
    Completed,
    Failed,
    Aborted,
}

impl InvestigationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvestigationStatus::Running)
    }
}

/// Estado derivado de una investigación. Nunca autoritativo: se reconstruye
/// del log en cada arranque y se mantiene al día evento a evento.
#[derive(Debug, Clone)]
pub struct InvestigationSnapshot {
    pub investigation_id: Uuid,
    pub status: InvestigationStatus,
    /// Calls comprometidos: `StepCompleted` + `StepFailed`. Un `StepStarted`
    /// colgante (crash antes del commit del resultado) no cuenta.
    pub calls_used: u64,
    /// Índice del próximo step a ejecutar (o a reintentar).
    pub next_step_index: u64,
    /// Fallos retryable consecutivos del step actual (numera el attempt).
    pub failed_attempts: u32,
    /// Seq del último evento comprometido (0 si el log está vacío).
    pub last_seq: u64,
    /// `StepStarted` sin cierre al final del log, si lo hay.
    pub pending_step: Option<u64>,
    pub completion_reason: Option<CompletionReason>,
}

impl InvestigationSnapshot {
    pub fn new(investigation_id: Uuid) -> Self {
        Self { investigation_id,
               status: InvestigationStatus::Running,
               calls_used: 0,
               next_step_index: 0,
               failed_attempts: 0,
               last_seq: 0,
               pending_step: None,
               completion_reason: None }
    }
}

/// Aplica un evento comprometido al snapshot. Compartida entre el replay y el
/// loop en vivo; toda regla de derivación de estado vive aquí.
pub fn apply(snapshot: &mut InvestigationSnapshot, event: &Event) {
    match &event.kind {
        EventKind::StepStarted { step_index, .. } => {
            snapshot.pending_step = Some(*step_index);
            snapshot.next_step_index = *step_index;
        }
        EventKind::StepCompleted { step_index, .. } => {
            snapshot.calls_used += 1;
            snapshot.pending_step = None;
            snapshot.failed_attempts = 0;
            snapshot.next_step_index = step_index + 1;
        }
        EventKind::StepFailed { retryable, .. } => {
            snapshot.calls_used += 1;
            snapshot.pending_step = None;
            if *retryable {
                snapshot.failed_attempts += 1;
            } else {
                snapshot.status = InvestigationStatus::Failed;
            }
        }
        EventKind::ArtifactProduced { .. } => {}
        EventKind::InvestigationCompleted { reason, .. } => {
            snapshot.status = InvestigationStatus::Completed;
            snapshot.completion_reason = Some(*reason);
        }
        EventKind::InvestigationAborted { .. } => {
            snapshot.status = InvestigationStatus::Aborted;
        }
    }
    snapshot.last_seq = event.seq;
}

/// Reconstruye el snapshot validando invariantes del log:
/// - seq contiguos arrancando en 1 (sin gaps);
/// - ningún evento después de un kind terminal.
pub fn replay(investigation_id: Uuid, events: &[Event]) -> Result<InvestigationSnapshot, EngineError> {
    let mut snapshot = InvestigationSnapshot::new(investigation_id);
    for (offset, event) in events.iter().enumerate() {
        let expected = offset as u64 + 1;
        if event.seq != expected {
            return Err(EngineError::Corruption(format!("sequence gap: expected seq {expected}, found {}",
                                                       event.seq)));
        }
        if snapshot.status.is_terminal() {
            return Err(EngineError::Corruption(format!("event seq {} follows a terminal event", event.seq)));
        }
        apply(&mut snapshot, event);
    }
    Ok(snapshot)
}
