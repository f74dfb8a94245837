// Agent handle: the orchestrator-side proxy for one concurrent decision agent
//
// The handle hides worker lifecycle (boot, reboot, termination) and message
// routing behind three operations: boot, request_action and destroy. All
// inbound events pass through one router task per worker instance, which
// compares every event's correlation ID against the handle's outstanding
// phase and drops mismatches. That single comparison point is what makes a
// reboot race-free: a superseded worker can keep talking, nobody listens.

use log::{debug, error};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;
use crate::protocol::{BotCommand, BotEvent, Origin, Turn};
use crate::types::{CorrelationId, Move, PlayerId};
use crate::worker::{PlayerFactory, Worker};

/// Callback invoked for every improving decision reported during a request
pub type DecisionFn = Box<dyn Fn(CorrelationId, Move, u8) + Send + Sync>;

/// Maximum wait for a boot acknowledgment; a slower boot is fatal
pub const BOOT_TIMEOUT_MS: u64 = 2000;

struct BotInner {
    idle: bool,
    /// Correlation ID of the outstanding boot or request; events carrying
    /// anything else are stale by definition
    correlation_id: Option<CorrelationId>,
    on_decision: Option<DecisionFn>,
    boot_waiter: Option<oneshot::Sender<Result<(), EngineError>>>,
    fault: Option<EngineError>,
}

/// Handle owning one concurrently-running decision agent
pub struct Bot {
    id: PlayerId,
    parameters: serde_json::Value,
    factory: PlayerFactory,
    inner: Arc<Mutex<BotInner>>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl Bot {
    pub fn new(id: PlayerId, factory: PlayerFactory, parameters: serde_json::Value) -> Self {
        Bot {
            id,
            parameters,
            factory,
            inner: Arc::new(Mutex::new(BotInner {
                idle: false,
                correlation_id: None,
                on_decision: None,
                boot_waiter: None,
                fault: None,
            })),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// True only after an `Idle` acknowledgment and before the next request
    pub fn is_idle(&self) -> bool {
        self.inner.lock().idle
    }

    /// Takes the pending fatal fault, if the agent reported one
    pub fn take_fault(&self) -> Option<EngineError> {
        self.inner.lock().fault.take()
    }

    /// Terminates any existing worker, spawns a fresh one and resolves once
    /// `Idle { origin: Boot }` arrives for this exact correlation ID.
    ///
    /// Fails with `BootTimeout` if no acknowledgment arrives within
    /// `BOOT_TIMEOUT_MS`; the handle is destroyed in that case.
    pub async fn boot(&mut self, correlation_id: CorrelationId) -> Result<(), EngineError> {
        if let Some(old) = self.worker.lock().take() {
            debug!("{}: terminating {} before reboot", self.id, old.id);
            old.terminate();
        }

        let (worker, events) = Worker::spawn(&self.factory);
        let worker_id = worker.id;
        let (waiter_tx, waiter_rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            inner.idle = false;
            inner.correlation_id = Some(correlation_id);
            inner.on_decision = None;
            inner.fault = None;
            inner.boot_waiter = Some(waiter_tx);
        }
        tokio::spawn(route_events(
            self.id,
            Arc::clone(&self.inner),
            Arc::clone(&self.worker),
            events,
        ));

        worker
            .commands
            .send(BotCommand::Boot {
                worker_id,
                correlation_id,
                parameters: self.parameters.clone(),
            })
            .map_err(|_| EngineError::AgentFault {
                id: self.id,
                message: "worker rejected boot command".to_string(),
            })?;
        *self.worker.lock() = Some(worker);

        let result = match tokio::time::timeout(Duration::from_millis(BOOT_TIMEOUT_MS), waiter_rx)
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_recv)) => Err(EngineError::AgentFault {
                id: self.id,
                message: "worker went away during boot".to_string(),
            }),
            Err(_elapsed) => Err(EngineError::BootTimeout {
                id: self.id,
                timeout_ms: BOOT_TIMEOUT_MS,
            }),
        };
        // A handle whose boot failed holds no usable worker
        if result.is_err() {
            self.destroy();
        }
        result
    }

    /// Sends a decision request for one turn and registers the callback for
    /// its streamed results.
    ///
    /// Precondition: the handle must be idle. Calling while busy is caller
    /// misuse and fails loudly. The call does not wait for completion; the
    /// handle returns to idle when `Idle { origin: Request }` arrives.
    pub fn request_action(&self, turn: Turn, on_decision: DecisionFn) -> Result<(), EngineError> {
        let correlation_id = turn.correlation_id;
        let (worker_id, commands) = {
            let guard = self.worker.lock();
            let worker = guard.as_ref().ok_or(EngineError::NotBooted(self.id))?;
            (worker.id, worker.commands.clone())
        };
        {
            let mut inner = self.inner.lock();
            if !inner.idle {
                return Err(EngineError::NotIdle(self.id));
            }
            inner.idle = false;
            inner.correlation_id = Some(correlation_id);
            inner.on_decision = Some(on_decision);
        }

        commands
            .send(BotCommand::Request { worker_id, turn })
            .map_err(|_| EngineError::AgentFault {
                id: self.id,
                message: "worker rejected request command".to_string(),
            })
    }

    /// Unconditionally terminates the worker and marks the handle not idle;
    /// safe at any time, including mid-request
    pub fn destroy(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.terminate();
        }
        let mut inner = self.inner.lock();
        inner.idle = false;
        inner.correlation_id = None;
        inner.on_decision = None;
        inner.boot_waiter = None;
    }
}

/// Drains one worker instance's events, filtering by correlation ID.
///
/// `Result` and `Idle` events for a correlation other than the outstanding
/// one are dropped with a debug log; an `Error` event is fatal regardless of
/// correlation and self-destroys the handle.
async fn route_events(
    id: PlayerId,
    inner: Arc<Mutex<BotInner>>,
    worker_slot: Arc<Mutex<Option<Worker>>>,
    mut events: mpsc::UnboundedReceiver<BotEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            BotEvent::Idle {
                worker_id,
                correlation_id,
                origin,
            } => {
                let waiter = {
                    let mut guard = inner.lock();
                    if guard.correlation_id != Some(correlation_id) {
                        debug!(
                            "{}: dropping stale idle from {} ({})",
                            id, worker_id, correlation_id
                        );
                        continue;
                    }
                    guard.idle = true;
                    match origin {
                        Origin::Boot => guard.boot_waiter.take(),
                        Origin::Request => {
                            guard.on_decision = None;
                            None
                        }
                    }
                };
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(()));
                }
            }
            BotEvent::Result {
                worker_id,
                correlation_id,
                mv,
                depth,
                ..
            } => {
                let guard = inner.lock();
                if guard.correlation_id != Some(correlation_id) {
                    debug!(
                        "{}: dropping stale result from {} ({})",
                        id, worker_id, correlation_id
                    );
                    continue;
                }
                if let Some(on_decision) = guard.on_decision.as_ref() {
                    on_decision(correlation_id, mv, depth);
                }
            }
            BotEvent::Error {
                worker_id, message, ..
            } => {
                error!("{}: fatal fault from {}: {}", id, worker_id, message);
                let waiter = {
                    let mut guard = inner.lock();
                    guard.idle = false;
                    guard.on_decision = None;
                    guard.fault = Some(EngineError::AgentFault {
                        id,
                        message: message.clone(),
                    });
                    guard.boot_waiter.take()
                };
                if let Some(worker) = worker_slot.lock().take() {
                    worker.terminate();
                }
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(EngineError::AgentFault { id, message }));
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkerId;

    fn fresh_inner(correlation_id: CorrelationId, on_decision: Option<DecisionFn>) -> BotInner {
        BotInner {
            idle: false,
            correlation_id: Some(correlation_id),
            on_decision,
            boot_waiter: None,
            fault: None,
        }
    }

    fn recorder() -> (DecisionFn, Arc<Mutex<Vec<(CorrelationId, Move, u8)>>>) {
        let seen: Arc<Mutex<Vec<(CorrelationId, Move, u8)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: DecisionFn = Box::new(move |corr, mv, depth| {
            sink.lock().push((corr, mv, depth));
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn test_stale_result_does_not_reach_callback() {
        let current = CorrelationId::mint();
        let stale = CorrelationId::mint();
        let (callback, seen) = recorder();
        let inner = Arc::new(Mutex::new(fresh_inner(current, Some(callback))));
        let worker_slot = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let router = tokio::spawn(route_events(
            PlayerId(1),
            Arc::clone(&inner),
            worker_slot,
            events_rx,
        ));

        events_tx
            .send(BotEvent::Result {
                worker_id: WorkerId::mint(),
                correlation_id: stale,
                origin: Origin::Request,
                mv: Move::Larboard,
                depth: 3,
            })
            .unwrap();
        events_tx
            .send(BotEvent::Result {
                worker_id: WorkerId::mint(),
                correlation_id: current,
                origin: Origin::Request,
                mv: Move::Starboard,
                depth: 2,
            })
            .unwrap();
        drop(events_tx);
        router.await.unwrap();

        let seen = seen.lock();
        assert_eq!(
            seen.as_slice(),
            &[(current, Move::Starboard, 2)],
            "only the matching correlation may reach the callback"
        );
    }

    #[tokio::test]
    async fn test_stale_idle_does_not_flip_handle_to_idle() {
        let current = CorrelationId::mint();
        let stale = CorrelationId::mint();
        let inner = Arc::new(Mutex::new(fresh_inner(current, None)));
        let worker_slot = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let router = tokio::spawn(route_events(
            PlayerId(2),
            Arc::clone(&inner),
            worker_slot,
            events_rx,
        ));

        events_tx
            .send(BotEvent::Idle {
                worker_id: WorkerId::mint(),
                correlation_id: stale,
                origin: Origin::Request,
            })
            .unwrap();
        drop(events_tx);
        router.await.unwrap();

        assert!(
            !inner.lock().idle,
            "a stale idle must not alter handle state"
        );
    }

    #[tokio::test]
    async fn test_matching_idle_flips_handle_to_idle_and_clears_callback() {
        let current = CorrelationId::mint();
        let (callback, _seen) = recorder();
        let inner = Arc::new(Mutex::new(fresh_inner(current, Some(callback))));
        let worker_slot = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let router = tokio::spawn(route_events(
            PlayerId(3),
            Arc::clone(&inner),
            worker_slot,
            events_rx,
        ));

        events_tx
            .send(BotEvent::Idle {
                worker_id: WorkerId::mint(),
                correlation_id: current,
                origin: Origin::Request,
            })
            .unwrap();
        drop(events_tx);
        router.await.unwrap();

        let guard = inner.lock();
        assert!(guard.idle);
        assert!(guard.on_decision.is_none());
    }

    #[tokio::test]
    async fn test_error_event_parks_fault_even_with_stale_correlation() {
        let current = CorrelationId::mint();
        let stale = CorrelationId::mint();
        let inner = Arc::new(Mutex::new(fresh_inner(current, None)));
        let worker_slot = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let router = tokio::spawn(route_events(
            PlayerId(4),
            Arc::clone(&inner),
            worker_slot,
            events_rx,
        ));

        events_tx
            .send(BotEvent::Error {
                worker_id: WorkerId::mint(),
                correlation_id: stale,
                message: "agent died".to_string(),
            })
            .unwrap();
        router.await.unwrap();

        let mut guard = inner.lock();
        assert!(!guard.idle);
        assert!(
            matches!(guard.fault.take(), Some(EngineError::AgentFault { .. })),
            "an error event is fatal regardless of correlation"
        );
    }
}
