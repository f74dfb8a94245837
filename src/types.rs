// Core value types shared by the grid, the agent protocol and the orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Integer cell coordinates on the grid
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Placeholder position of a participant that has not spawned yet
    pub const SENTINEL: Position = Position { x: -1, y: -1 };

    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    /// The cell one step away along the given heading
    pub fn step(&self, heading: Heading) -> Position {
        Position {
            x: self.x + heading.dx,
            y: self.y + heading.dy,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Unit vector encoding the direction a participant is facing.
///
/// Replaces the original `prev` back-reference: the pair `(position, heading)`
/// carries the same information as `(position, position - prev)` without
/// building a linked chain of visited cells.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Heading {
    pub dx: i32,
    pub dy: i32,
}

impl Heading {
    /// Heading of a participant that has not spawned yet
    pub const NONE: Heading = Heading { dx: 0, dy: 0 };

    /// The four axis-aligned unit headings
    pub fn all() -> [Heading; 4] {
        [
            Heading { dx: 1, dy: 0 },
            Heading { dx: -1, dy: 0 },
            Heading { dx: 0, dy: 1 },
            Heading { dx: 0, dy: -1 },
        ]
    }

    /// Rotates the heading according to a relative move.
    ///
    /// The geometry matches the original move targets: facing along x with
    /// delta d, starboard turns towards positive y and larboard towards
    /// negative y.
    pub fn rotate(self, mv: Move) -> Heading {
        match mv {
            Move::Forward => self,
            Move::Larboard => Heading {
                dx: self.dy,
                dy: -self.dx,
            },
            Move::Starboard => Heading {
                dx: -self.dy,
                dy: self.dx,
            },
        }
    }
}

/// A relative move, expressed against the current heading
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Move {
    /// Continue straight ahead; also the fallback when no decision arrived
    #[default]
    Forward,
    /// Turn left relative to the heading
    Larboard,
    /// Turn right relative to the heading
    Starboard,
}

impl Move {
    pub fn all() -> [Move; 3] {
        [Move::Forward, Move::Larboard, Move::Starboard]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Forward => "FORWARD",
            Move::Larboard => "LARBOARD",
            Move::Starboard => "STARBOARD",
        }
    }
}

/// Opaque identity of one participant
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Token scoping a request/response exchange to one boot phase or one tick.
///
/// Every inbound agent message is compared against the handle's current
/// correlation ID; a mismatch means the message belongs to a superseded
/// phase and is dropped. This is the race-safety mechanism that makes
/// rebooting a mid-search agent safe.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct CorrelationId(u64);

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

impl CorrelationId {
    /// Mints a fresh process-wide unique token
    pub fn mint() -> Self {
        CorrelationId(NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corr-{}", self.0)
    }
}

/// Identity of one spawned worker instance; a handle that reboots gets a
/// fresh worker ID, so late messages also identify which instance sent them
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct WorkerId(u64);

static NEXT_WORKER: AtomicU64 = AtomicU64::new(1);

impl WorkerId {
    pub fn mint() -> Self {
        WorkerId(NEXT_WORKER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Orchestrator lifecycle state
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum GameStatus {
    Clear,
    Running,
    Finished,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Clear => "CLEAR",
            GameStatus::Running => "RUNNING",
            GameStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational search statistics for one participant's last resolved turn
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Performance {
    /// Depth of the last decision applied
    pub depth: u8,
    /// Milliseconds between the request and the last decision received
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_facing_positive_x() {
        let heading = Heading { dx: 1, dy: 0 };
        assert_eq!(heading.rotate(Move::Forward), Heading { dx: 1, dy: 0 });
        assert_eq!(heading.rotate(Move::Starboard), Heading { dx: 0, dy: 1 });
        assert_eq!(heading.rotate(Move::Larboard), Heading { dx: 0, dy: -1 });
    }

    #[test]
    fn test_rotate_facing_positive_y() {
        let heading = Heading { dx: 0, dy: 1 };
        assert_eq!(heading.rotate(Move::Forward), Heading { dx: 0, dy: 1 });
        assert_eq!(heading.rotate(Move::Starboard), Heading { dx: -1, dy: 0 });
        assert_eq!(heading.rotate(Move::Larboard), Heading { dx: 1, dy: 0 });
    }

    #[test]
    fn test_four_rotations_return_to_start() {
        for heading in Heading::all() {
            let mut h = heading;
            for _ in 0..4 {
                h = h.rotate(Move::Starboard);
            }
            assert_eq!(h, heading, "four starboard turns should be identity");
        }
    }

    #[test]
    fn test_step_applies_heading() {
        let pos = Position::new(3, 4);
        assert_eq!(pos.step(Heading { dx: 0, dy: -1 }), Position::new(3, 3));
        assert_eq!(pos.step(Heading { dx: 1, dy: 0 }), Position::new(4, 4));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::mint();
        let b = CorrelationId::mint();
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_move_is_forward() {
        assert_eq!(Move::default(), Move::Forward);
    }
}
