//! Configuración del motor y resultado de una corrida.

use std::time::Duration;

use uuid::Uuid;

use crate::constants::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_RETRIES, DEFAULT_STEP_DEADLINE_MS};
use crate::replay::{InvestigationSnapshot, InvestigationStatus};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Máximo de invocaciones de capability (entero >= 0; con 0 la corrida
    /// completa inmediatamente con `budget_exhausted` sin invocar nada).
    pub call_budget: u64,
    /// Reintentos adicionales por step ante fallos recuperables.
    pub max_retries: u32,
    /// Base del backoff exponencial entre reintentos.
    pub backoff_base: Duration,
    /// Deadline por invocación de capability.
    pub step_deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { call_budget: 1,
               max_retries: DEFAULT_MAX_RETRIES,
               backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
               step_deadline: Duration::from_millis(DEFAULT_STEP_DEADLINE_MS) }
    }
}

impl EngineConfig {
    pub fn with_budget(call_budget: u64) -> Self {
        Self { call_budget, ..Self::default() }
    }
}

/// Desenlace de `InvestigationEngine::run`. La corrida siempre termina en uno
/// de los tres estados terminales; el log es la explicación autoritativa.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub investigation_id: Uuid,
    pub status: InvestigationStatus,
    pub calls_used: u64,
}

impl From<&InvestigationSnapshot> for RunOutcome {
    fn from(snapshot: &InvestigationSnapshot) -> Self {
        Self { investigation_id: snapshot.investigation_id,
               status: snapshot.status,
               calls_used: snapshot.calls_used }
    }
}
