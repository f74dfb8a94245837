// Worker runtime: one concurrent unit per agent instance
//
// Each boot spawns a fresh worker task owning its `Player`. Commands arrive
// over an mpsc channel and are processed strictly in order, so a worker only
// ever answers its most recent command and the protocol's per-correlation
// ordering guarantee holds by construction. The CPU-bound search runs on the
// blocking pool while results stream back through the event channel; a panic
// inside the search surfaces as an `Error` event, never as a lost task.

use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::player::Player;
use crate::protocol::{BotCommand, BotEvent, Origin};
use crate::types::WorkerId;

/// Factory invoked on every boot to build the worker's `Player`
pub type PlayerFactory = Box<dyn Fn() -> Box<dyn Player> + Send + Sync>;

/// A spawned worker instance and the sending half of its command channel
pub(crate) struct Worker {
    pub id: WorkerId,
    pub commands: mpsc::UnboundedSender<BotCommand>,
    task: JoinHandle<()>,
}

impl Worker {
    /// Spawns a fresh worker around a newly built player, returning the
    /// instance and the receiving half of its event channel
    pub fn spawn(factory: &PlayerFactory) -> (Worker, mpsc::UnboundedReceiver<BotEvent>) {
        let id = WorkerId::mint();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(id, factory(), command_rx, event_tx));
        let worker = Worker {
            id,
            commands: command_tx,
            task,
        };
        (worker, event_rx)
    }

    /// Stops the worker task; any search already on the blocking pool keeps
    /// running to completion but its events land in a closed channel
    pub fn terminate(&self) {
        self.task.abort();
    }
}

async fn run(
    worker_id: WorkerId,
    mut player: Box<dyn Player>,
    mut commands: mpsc::UnboundedReceiver<BotCommand>,
    events: mpsc::UnboundedSender<BotEvent>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            BotCommand::Boot {
                correlation_id,
                parameters,
                ..
            } => {
                debug!("{}: boot order received ({})", worker_id, correlation_id);
                let event = match player.init(&parameters) {
                    Ok(()) => BotEvent::Idle {
                        worker_id,
                        correlation_id,
                        origin: Origin::Boot,
                    },
                    Err(message) => BotEvent::Error {
                        worker_id,
                        correlation_id,
                        message,
                    },
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            BotCommand::Request { turn, .. } => {
                let correlation_id = turn.correlation_id;
                debug!(
                    "{}: request received ({}) at {}",
                    worker_id, correlation_id, turn.position
                );
                let result_tx = events.clone();
                let search = tokio::task::spawn_blocking(move || {
                    player.act(&turn, &mut |mv, depth| {
                        let _ = result_tx.send(BotEvent::Result {
                            worker_id,
                            correlation_id,
                            origin: Origin::Request,
                            mv,
                            depth,
                        });
                    });
                    player
                });
                match search.await {
                    Ok(returned) => {
                        player = returned;
                        if events
                            .send(BotEvent::Idle {
                                worker_id,
                                correlation_id,
                                origin: Origin::Request,
                            })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(join_error) => {
                        error!("{}: search task failed: {}", worker_id, join_error);
                        let _ = events.send(BotEvent::Error {
                            worker_id,
                            correlation_id,
                            message: format!("search task failed: {}", join_error),
                        });
                        return;
                    }
                }
            }
        }
    }
}
