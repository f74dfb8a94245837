// Asynchronous per-tick trace logging
//
// Fire-and-forget JSONL writer so tracing never blocks the tick cycle. One
// line per resolved tick with every participant's position, liveness and
// search statistics. Diagnostics only; the engine behaves identically with
// the logger disabled.

use log::error;
use serde::Serialize;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::{GameStatus, Performance, PlayerId, Position};

/// One participant's state after a resolved tick
#[derive(Debug, Serialize)]
pub struct PlayerTickRecord {
    pub id: PlayerId,
    pub position: Position,
    pub alive: bool,
    pub performance: Performance,
}

#[derive(Debug, Serialize)]
struct TickLogEntry {
    tick: u64,
    status: String,
    players: Vec<PlayerTickRecord>,
    timestamp: String,
}

/// Shared tick logger state
/// Uses Arc<Mutex<File>> to allow concurrent async writes from multiple tasks
#[derive(Clone)]
pub struct TickLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl TickLogger {
    /// Creates a new tick logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                log::info!("Tick logging enabled: {}", log_file_path);
                TickLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create tick log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled tick logger (no-op)
    pub fn disabled() -> Self {
        TickLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    /// Logs a resolved tick asynchronously (fire-and-forget)
    pub fn log_tick(&self, tick: u64, status: GameStatus, players: Vec<PlayerTickRecord>) {
        if !self.enabled {
            return;
        }

        let file_handle = self.file.clone();
        tokio::spawn(async move {
            Self::log_tick_internal(file_handle, tick, status, players).await;
        });
    }

    async fn log_tick_internal(
        file_handle: Arc<Mutex<Option<File>>>,
        tick: u64,
        status: GameStatus,
        players: Vec<PlayerTickRecord>,
    ) {
        let mut file_guard = file_handle.lock().await;

        if let Some(file) = file_guard.as_mut() {
            let entry = TickLogEntry {
                tick,
                status: status.to_string(),
                players,
                timestamp: chrono::Utc::now().to_rfc3339(),
            };

            match serde_json::to_string(&entry) {
                Ok(json_line) => {
                    let line_with_newline = format!("{}\n", json_line);
                    if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                        error!("Failed to write tick log entry: {}", e);
                    } else if let Err(e) = file.flush().await {
                        error!("Failed to flush tick log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize tick log entry: {}", e);
                }
            }
        }
    }
}
