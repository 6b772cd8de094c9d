//! Step Executor: invocación de una capability acotada por deadline.
//!
//! Transformación pura de una llamada a forma-evento: no persiste nada. El
//! timeout se reporta como fallo recuperable de kind `timeout`; la invocación
//! en vuelo se deja terminar en su thread (cancelación cooperativa, nunca se
//! interrumpe a mitad de ejecución).

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{Capability, StepFailure, StepRequest, StepRunResult};

pub struct StepExecutor {
    capability: Arc<dyn Capability>,
}

impl StepExecutor {
    pub fn new(capability: Arc<dyn Capability>) -> Self {
        Self { capability }
    }

    /// Ejecuta la capability y normaliza los tres desenlaces posibles:
    /// éxito, fallo recuperable (retryable) y fallo fatal.
    pub fn execute(&self, request: &StepRequest, deadline: Duration) -> StepRunResult {
        let (tx, rx) = mpsc::channel();
        let capability = Arc::clone(&self.capability);
        let req = request.clone();
        thread::spawn(move || {
            let _ = tx.send(capability.invoke(&req));
        });

        match rx.recv_timeout(deadline) {
            Ok(Ok(out)) => StepRunResult::Success { output: out.output,
                                                    artifacts: out.artifacts },
            Ok(Err(failure)) if failure.is_retryable() => StepRunResult::RecoverableFailure { failure },
            Ok(Err(failure)) => StepRunResult::FatalFailure { failure },
            Err(RecvTimeoutError::Timeout) => {
                StepRunResult::RecoverableFailure { failure: StepFailure::Timeout { timeout_ms:
                                                                                        deadline.as_millis()
                                                                                        as u64 } }
            }
            // El thread soltó el canal sin responder (panic de la capability).
            Err(RecvTimeoutError::Disconnected) => {
                StepRunResult::FatalFailure { failure: StepFailure::Fatal("capability panicked".into()) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::CapabilityOutput;
    use serde_json::json;

    struct Echo;
    impl Capability for Echo {
        fn invoke(&self, request: &StepRequest) -> Result<CapabilityOutput, StepFailure> {
            Ok(CapabilityOutput { output: request.payload.clone(),
                                  artifacts: vec![] })
        }
    }

    struct Slow;
    impl Capability for Slow {
        fn invoke(&self, _request: &StepRequest) -> Result<CapabilityOutput, StepFailure> {
            thread::sleep(Duration::from_millis(200));
            Ok(CapabilityOutput { output: json!({}), artifacts: vec![] })
        }
    }

    fn request() -> StepRequest {
        StepRequest { step_index: 0,
                      tool: "echo".into(),
                      payload: json!({"x": 1}) }
    }

    #[test]
    fn success_is_normalized_with_output() {
        let ex = StepExecutor::new(Arc::new(Echo));
        match ex.execute(&request(), Duration::from_secs(1)) {
            StepRunResult::Success { output, artifacts } => {
                assert_eq!(output, json!({"x": 1}));
                assert!(artifacts.is_empty());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn exceeding_deadline_is_a_recoverable_timeout() {
        let ex = StepExecutor::new(Arc::new(Slow));
        match ex.execute(&request(), Duration::from_millis(20)) {
            StepRunResult::RecoverableFailure { failure: StepFailure::Timeout { timeout_ms } } => {
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
