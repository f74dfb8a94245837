// Wire contract between an agent handle and its worker
//
// Commands flow handle -> worker, events flow worker -> handle, each over a
// dedicated channel per worker instance so production order is delivery
// order. Every message carries the worker instance ID and the correlation ID
// of the phase it answers; the handle drops events whose correlation ID does
// not match its outstanding boot or request.

use crate::grid::Grid;
use crate::types::{CorrelationId, Heading, Move, PlayerId, Position, WorkerId};

/// One decision round handed to an agent: where the participant stands,
/// which way it faces, and an immutable snapshot of the grid. Carries no
/// mutable state back.
#[derive(Debug, Clone)]
pub struct Turn {
    pub correlation_id: CorrelationId,
    pub player_id: PlayerId,
    pub position: Position,
    pub heading: Heading,
    pub grid: Grid,
}

/// Which outbound command an `Idle` or `Result` event answers
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Origin {
    Boot,
    Request,
}

/// Handle -> worker commands
#[derive(Debug)]
pub enum BotCommand {
    /// Initialize or re-initialize the agent with opaque parameters.
    /// Must eventually be answered by exactly one `Idle { origin: Boot }`.
    Boot {
        worker_id: WorkerId,
        correlation_id: CorrelationId,
        parameters: serde_json::Value,
    },
    /// Ask for a decision on the given turn. Answered by zero or more
    /// `Result` events followed by exactly one `Idle { origin: Request }`.
    Request { worker_id: WorkerId, turn: Turn },
}

/// Worker -> handle events
#[derive(Debug)]
pub enum BotEvent {
    /// An improving decision from an anytime search still in progress
    Result {
        worker_id: WorkerId,
        correlation_id: CorrelationId,
        origin: Origin,
        mv: Move,
        depth: u8,
    },
    /// The worker finished the named phase and can accept a new command
    Idle {
        worker_id: WorkerId,
        correlation_id: CorrelationId,
        origin: Origin,
    },
    /// Unrecoverable failure; the worker is presumed dead
    Error {
        worker_id: WorkerId,
        correlation_id: CorrelationId,
        message: String,
    },
}

impl BotEvent {
    /// Correlation ID carried by the event, whatever its kind
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            BotEvent::Result { correlation_id, .. }
            | BotEvent::Idle { correlation_id, .. }
            | BotEvent::Error { correlation_id, .. } => *correlation_id,
        }
    }
}
