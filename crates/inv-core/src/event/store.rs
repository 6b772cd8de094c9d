//! Contrato del `EventStore` y backend en memoria.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{Event, ProposedEvent};
use crate::errors::EngineError;

/// Almacenamiento de eventos append-only.
///
/// `append` es el único camino de mutación del estado de una investigación:
/// - Valida `proposed.seq == last + 1`; si no, `EngineError::Conflict`.
/// - Rechaza escrituras tras un evento terminal (`ClosedInvestigation`).
/// - En backends durables, no retorna Ok hasta que el evento esté fijado en
///   storage (sin escrituras parciales).
pub trait EventStore {
    fn append(&mut self, investigation_id: Uuid, proposed: ProposedEvent) -> Result<Event, EngineError>;
    /// Lista todos los eventos de una investigación en orden de commit.
    fn read_all(&self, investigation_id: Uuid) -> Result<Vec<Event>, EngineError>;
}

/// Backend en memoria: referencia del contrato y soporte de tests.
pub struct InMemoryEventStore {
    inner: HashMap<Uuid, Vec<Event>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self { inner: HashMap::new() }
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&mut self, investigation_id: Uuid, proposed: ProposedEvent) -> Result<Event, EngineError> {
        let log = self.inner.entry(investigation_id).or_default();
        let last_seq = log.last().map(|e| e.seq).unwrap_or(0);
        if log.last().map(|e| e.kind.is_terminal()).unwrap_or(false) {
            return Err(EngineError::ClosedInvestigation);
        }
        if proposed.seq != last_seq + 1 {
            return Err(EngineError::Conflict { proposed: proposed.seq,
                                               expected: last_seq + 1 });
        }
        let ev = Event { seq: proposed.seq,
                         investigation_id,
                         kind: proposed.kind,
                         ts: Utc::now(),
                         parent_seq: proposed.parent_seq };
        log.push(ev.clone());
        Ok(ev)
    }

    fn read_all(&self, investigation_id: Uuid) -> Result<Vec<Event>, EngineError> {
        Ok(self.inner.get(&investigation_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CompletionReason, EventKind};
    use serde_json::json;

    fn started(seq: u64) -> ProposedEvent {
        ProposedEvent { seq,
                        kind: EventKind::StepStarted { step_index: seq - 1,
                                                       attempt: 1,
                                                       request: json!({}) },
                        parent_seq: (seq > 1).then(|| seq - 1) }
    }

    #[test]
    fn seq_starts_at_one_and_is_contiguous() {
        let mut store = InMemoryEventStore::default();
        let id = Uuid::new_v4();
        for seq in 1..=5 {
            store.append(id, started(seq)).expect("append");
        }
        let events = store.read_all(id).expect("read_all");
        for (expected, ev) in (1u64..).zip(events.iter()) {
            assert_eq!(ev.seq, expected);
        }
    }

    #[test]
    fn stale_seq_conflicts_without_partial_commit() {
        let mut store = InMemoryEventStore::default();
        let id = Uuid::new_v4();
        store.append(id, started(1)).expect("append");
        let err = store.append(id, started(1)).unwrap_err();
        assert_eq!(err, EngineError::Conflict { proposed: 1, expected: 2 });
        assert_eq!(store.read_all(id).unwrap().len(), 1);
    }

    #[test]
    fn terminal_event_closes_the_log() {
        let mut store = InMemoryEventStore::default();
        let id = Uuid::new_v4();
        store.append(id,
                     ProposedEvent { seq: 1,
                                     kind: EventKind::InvestigationCompleted { reason:
                                                                                   CompletionReason::BudgetExhausted,
                                                                               calls_used: 0 },
                                     parent_seq: None })
             .expect("append terminal");
        let err = store.append(id, started(2)).unwrap_err();
        assert_eq!(err, EngineError::ClosedInvestigation);
    }
}
