//! inv-core: Motor de investigaciones autónomas (event-sourced)
//!
//! Una "investigación" es un loop acotado por presupuesto de llamadas a una
//! capability (modelo/herramienta/análisis). Todo avance de estado se
//! materializa como eventos append-only; el estado en memoria es siempre
//! derivado del log (replay) y nunca autoritativo.
pub mod artifact;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod replay;
pub mod step;

pub use artifact::{Artifact, ArtifactRegistry, InMemoryArtifactRegistry};
pub use engine::{CompletionPolicy, EngineConfig, InvestigationEngine, RunOutcome, StepPlanner};
pub use errors::EngineError;
pub use event::{CompletionReason, Event, EventKind, EventStore, InMemoryEventStore, ProposedEvent};
pub use replay::{replay, InvestigationSnapshot, InvestigationStatus};
pub use step::{ArtifactDraft, Capability, CapabilityOutput, StepExecutor, StepFailure, StepRequest, StepRunResult};
