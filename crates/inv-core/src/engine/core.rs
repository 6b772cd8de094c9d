//! Implementación del Investigation Loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::Value;
use uuid::Uuid;

use crate::artifact::ArtifactRegistry;
use crate::constants::MAX_APPEND_RETRIES;
use crate::engine::{CompletionPolicy, EngineConfig, RunOutcome, StepPlanner};
use crate::errors::EngineError;
use crate::event::{CompletionReason, EventKind, EventStore, ProposedEvent};
use crate::hashing::{hash_value, to_canonical_json};
use crate::replay::{self, InvestigationSnapshot};
use crate::step::{ArtifactDraft, Capability, StepExecutor, StepFailure, StepRequest, StepRunResult};

/// Motor de investigaciones: máquina de estados
/// `Idle → Running → {Completed, Failed, Aborted}`.
///
/// Una instancia por investigación: el chequeo de seq del `EventStore`
/// actúa como lock optimista; ante un escritor concurrente exactamente uno
/// gana cada seq y el otro re-lee y reintenta.
pub struct InvestigationEngine<E, A>
    where E: EventStore,
          A: ArtifactRegistry
{
    event_store: E,
    artifacts: A,
    executor: StepExecutor,
    planner: Box<dyn StepPlanner>,
    policy: Box<dyn CompletionPolicy>,
    config: EngineConfig,
    cancel: Arc<AtomicBool>,
}

impl<E, A> InvestigationEngine<E, A>
    where E: EventStore,
          A: ArtifactRegistry
{
    pub fn new(event_store: E,
               artifacts: A,
               capability: Arc<dyn Capability>,
               planner: Box<dyn StepPlanner>,
               policy: Box<dyn CompletionPolicy>)
               -> Self {
        Self { event_store,
               artifacts,
               executor: StepExecutor::new(capability),
               planner,
               policy,
               config: EngineConfig::default(),
               cancel: Arc::new(AtomicBool::new(false)) }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Comparte una señal de cancelación externa (p.ej. un handler de
    /// SIGINT). La señal es advisory y se consulta sólo entre iteraciones.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Señal de cancelación cooperativa: se consulta sólo entre iteraciones;
    /// una invocación en vuelo termina o expira antes de honrarla.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Eventos comprometidos de una investigación (provenance).
    pub fn events_for(&self, investigation_id: Uuid) -> Result<Vec<crate::event::Event>, EngineError> {
        self.event_store.read_all(investigation_id)
    }

    /// Contenido de un artifact registrado.
    pub fn artifact(&self, hash: &str) -> Result<Value, EngineError> {
        self.artifacts.get(hash)
    }

    /// Corre (o reanuda) la investigación hasta un estado terminal.
    ///
    /// Orden por iteración: cancelación → presupuesto → policy → step. El
    /// chequeo de presupuesto precede a la policy para que, si ambos aplican
    /// en la misma iteración, gane `budget_exhausted`.
    pub fn run(&mut self, investigation_id: Uuid) -> Result<RunOutcome, EngineError> {
        // Resume: estado derivado del log + historia para el planner.
        let events = self.event_store.read_all(investigation_id)?;
        let mut snapshot = replay::replay(investigation_id, &events)?;
        for ev in &events {
            self.planner.observe(ev);
        }
        if snapshot.status.is_terminal() {
            return Ok(RunOutcome::from(&snapshot));
        }

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                let calls_used = snapshot.calls_used;
                self.append_next(&mut snapshot,
                                 EventKind::InvestigationAborted { reason: "cancel_requested".into(),
                                                                   calls_used })?;
                break;
            }
            if snapshot.calls_used >= self.config.call_budget {
                let calls_used = snapshot.calls_used;
                self.append_next(&mut snapshot,
                                 EventKind::InvestigationCompleted { reason: CompletionReason::BudgetExhausted,
                                                                     calls_used })?;
                break;
            }
            if self.policy.is_satisfied(&snapshot) {
                let calls_used = snapshot.calls_used;
                self.append_next(&mut snapshot,
                                 EventKind::InvestigationCompleted { reason: CompletionReason::GoalSatisfied,
                                                                     calls_used })?;
                break;
            }
            self.run_step(&mut snapshot)?;
            if snapshot.status.is_terminal() {
                break;
            }
        }
        Ok(RunOutcome::from(&snapshot))
    }

    /// Ejecuta un step con su política de reintentos.
    ///
    /// Cada intento invoca la capability y compromete su propio evento de
    /// cierre (provenance completa incluso de intentos fallidos). El intento
    /// que agota el límite se marca `retryable: false` y es terminal.
    fn run_step(&mut self, snapshot: &mut InvestigationSnapshot) -> Result<(), EngineError> {
        let request = self.planner.plan(snapshot);
        loop {
            let attempt = snapshot.failed_attempts + 1;
            let request_payload =
                serde_json::to_value(&request).map_err(|e| EngineError::Internal(format!("serialize request: {e}")))?;
            self.append_next(snapshot,
                             EventKind::StepStarted { step_index: request.step_index,
                                                      attempt,
                                                      request: request_payload })?;

            let failure = match self.executor.execute(&request, self.config.step_deadline) {
                StepRunResult::Success { output, artifacts } => {
                    match self.commit_success(snapshot, &request, attempt, output, artifacts)? {
                        None => return Ok(()),
                        // IO del registry: se degrada a fallo recuperable del step.
                        Some(storage_failure) => storage_failure,
                    }
                }
                StepRunResult::RecoverableFailure { failure } => failure,
                StepRunResult::FatalFailure { failure } => {
                    self.append_next(snapshot,
                                     EventKind::StepFailed { step_index: request.step_index,
                                                             attempt,
                                                             failure,
                                                             retryable: false })?;
                    return Ok(());
                }
            };

            let retries_left = attempt <= self.config.max_retries;
            self.append_next(snapshot,
                             EventKind::StepFailed { step_index: request.step_index,
                                                     attempt,
                                                     failure,
                                                     retryable: retries_left })?;
            if !retries_left {
                // Límite de reintentos agotado: el evento ya es terminal.
                return Ok(());
            }
            if snapshot.calls_used >= self.config.call_budget {
                // El presupuesto se agotó entre intentos; el loop externo
                // cierra con budget_exhausted.
                return Ok(());
            }
            thread::sleep(self.config.backoff_base * 2u32.saturating_pow(attempt - 1));
        }
    }

    /// Compromete un éxito: eventos `ArtifactProduced` + contenido en el
    /// registry + `StepCompleted`. El evento de cada artifact precede a su
    /// contenido (orden write-through).
    fn commit_success(&mut self,
                      snapshot: &mut InvestigationSnapshot,
                      request: &StepRequest,
                      attempt: u32,
                      output: Value,
                      artifacts: Vec<ArtifactDraft>)
                      -> Result<Option<StepFailure>, EngineError> {
        let mut hashes = Vec::with_capacity(artifacts.len());
        for draft in &artifacts {
            let hash = hash_value(&draft.payload);
            let size = to_canonical_json(&draft.payload).len() as u64;
            self.append_next(snapshot,
                             EventKind::ArtifactProduced { hash: hash.clone(),
                                                           kind: draft.kind.clone(),
                                                           size })?;
            let produced_in_seq = snapshot.last_seq;
            if let Err(e) = self.artifacts
                                .put(snapshot.investigation_id, produced_in_seq, &draft.kind, &draft.payload)
            {
                match e {
                    EngineError::Storage(msg) => return Ok(Some(StepFailure::Storage(msg))),
                    other => return Err(other),
                }
            }
            hashes.push(hash);
        }
        self.append_next(snapshot,
                         EventKind::StepCompleted { step_index: request.step_index,
                                                    attempt,
                                                    output,
                                                    artifact_hashes: hashes })?;
        Ok(None)
    }

    /// Append con seq derivado del snapshot. Ante `Conflict` re-lee el log,
    /// re-reduce y reintenta (acotado); el conflicto nunca se propaga salvo
    /// agotamiento de reintentos. El evento comprometido se aplica al
    /// snapshot y se notifica al planner.
    fn append_next(&mut self, snapshot: &mut InvestigationSnapshot, kind: EventKind) -> Result<(), EngineError> {
        let mut tries = 0;
        loop {
            let proposed = ProposedEvent { seq: snapshot.last_seq + 1,
                                           kind: kind.clone(),
                                           parent_seq: (snapshot.last_seq > 0).then(|| snapshot.last_seq) };
            match self.event_store.append(snapshot.investigation_id, proposed) {
                Ok(event) => {
                    replay::apply(snapshot, &event);
                    self.planner.observe(&event);
                    return Ok(());
                }
                Err(EngineError::Conflict { .. }) if tries < MAX_APPEND_RETRIES => {
                    tries += 1;
                    let events = self.event_store.read_all(snapshot.investigation_id)?;
                    *snapshot = replay::replay(snapshot.investigation_id, &events)?;
                    if snapshot.status.is_terminal() {
                        return Err(EngineError::ClosedInvestigation);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
