// Error taxonomy for the engine
//
// Sequencing errors are caller misuse and always fail loudly. Boot failures
// and fatal agent faults carry enough context to identify the offending
// participant. Stale correlation IDs are deliberately NOT an error: they are
// dropped at the handle with a debug log.

use thiserror::Error;

use crate::types::PlayerId;

#[derive(Error, Debug)]
pub enum EngineError {
    /// `start` called while the game is RUNNING
    #[error("can not start a game that has already started")]
    AlreadyStarted,

    /// `tick` called while the game is not RUNNING
    #[error("can not tick a game that is not running")]
    NotRunning,

    /// `request_action` called on a handle that is not idle
    #[error("can not request action of {0} while it is not idle")]
    NotIdle(PlayerId),

    /// Command issued to a handle whose worker was never booted or was destroyed
    #[error("{0} has not been booted")]
    NotBooted(PlayerId),

    /// No boot acknowledgment within the boot timeout; fatal for the handle
    #[error("{id} boot timed out after {timeout_ms} ms")]
    BootTimeout { id: PlayerId, timeout_ms: u64 },

    /// Unrecoverable agent failure; the handle has self-destroyed
    #[error("{id} agent failed fatally: {message}")]
    AgentFault { id: PlayerId, message: String },

    /// Reader called with an ID the game does not know
    #[error("unknown participant \"{0}\"")]
    UnknownPlayer(PlayerId),

    /// Could not place every participant on a free non-border cell
    #[error("no free spawn cell found after {attempts} attempts")]
    SpawnExhausted { attempts: u32 },
}
