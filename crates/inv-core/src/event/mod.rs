//! Eventos de investigación y contrato del `EventStore` append-only.
//!
//! Rol en el sistema:
//! - Cada iteración del loop emite eventos a un `EventStore` append-only; el
//!   log es la única fuente de verdad del estado de una investigación.
//! - El enum `EventKind` define el contrato observable y estable del motor.
//! - El replay de eventos (ver `crate::replay`) reconstruye el estado sin
//!   depender de estructuras mutables persistidas.
pub mod store;
pub mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{CompletionReason, Event, EventKind, ProposedEvent};
