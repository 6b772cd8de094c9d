//! Investigation Loop: orquestador del ciclo presupuesto/step/commit.
//!
//! El motor lee el estado actual del log, decide el siguiente paso (vía un
//! `StepPlanner` de dominio), ejecuta la capability con deadline y compromete
//! el resultado como eventos. Las interfaces consumidas se ligan en la
//! construcción del motor.

pub mod config;
pub mod core;

pub use config::{EngineConfig, RunOutcome};
pub use core::InvestigationEngine;

use crate::event::Event;
use crate::replay::InvestigationSnapshot;
use crate::step::StepRequest;

/// Lado de dominio de "decidir el siguiente paso". El motor permanece neutral
/// respecto a la semántica del payload.
pub trait StepPlanner {
    /// Construye la petición para `snapshot.next_step_index`.
    fn plan(&mut self, snapshot: &InvestigationSnapshot) -> StepRequest;
    /// Notificación de cada evento comprometido (para estado de dominio
    /// derivado, p.ej. beliefs). Por defecto no hace nada.
    fn observe(&mut self, _event: &Event) {}
}

/// Decisión externa y opaca de "investigación satisfecha". Se consulta
/// una vez por iteración; el motor no infiere su lógica interna.
pub trait CompletionPolicy {
    fn is_satisfied(&self, snapshot: &InvestigationSnapshot) -> bool;
}
