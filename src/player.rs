// Decision agents and the reference anytime lookahead search
//
// A `Player` is the strategy half of an agent: it runs inside a worker, gets
// re-initialized on every boot, and answers each turn by pushing zero or more
// improving decisions through the supplied callback before returning. The
// worker translates those callbacks into `Result` events and the return into
// the closing `Idle`.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::protocol::Turn;
use crate::types::{Heading, Move, Position};

/// Default lookahead depth when the boot parameters do not name one
pub const DEFAULT_SEARCH_DEPTH: u8 = 5;

/// Decision-making logic run inside a worker.
///
/// `act` must be an anytime computation: every call to `decide` reports a
/// decision that is at least as good as the previous one, so the latest
/// decision received before a deadline is always the best so far. Returning
/// from `act` signals that no more improvements are pending.
pub trait Player: Send + 'static {
    /// (Re-)initializes the agent from opaque boot parameters
    fn init(&mut self, parameters: &serde_json::Value) -> Result<(), String>;

    /// Decides a move for one turn, streaming improving `(move, depth)`
    /// pairs through `decide`
    fn act(&mut self, turn: &Turn, decide: &mut dyn FnMut(Move, u8));
}

/// Boot parameters understood by `SearchPlayer`
#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    depth: Option<u8>,
    seed: Option<u64>,
}

/// One explored node: the cell reached, the heading there, the first move
/// taken from the root to get there, and how deep it sits
struct Node {
    target: Position,
    heading: Heading,
    origin: Move,
    depth: u8,
}

/// Reference agent: randomized breadth-first lookahead over the tree of
/// reachable positions.
///
/// Each node has at most three children (forward, larboard, starboard
/// relative to its heading); children whose target cell is off-grid or
/// already occupied in the snapshot are pruned. Every time a new depth layer
/// is reached the first surviving node improves on the best score seen so
/// far and its origin move is reported, which makes the sequence of reported
/// depths strictly increasing. Sibling order within a layer is shuffled so
/// ties between equally deep origins do not systematically favor one
/// direction.
pub struct SearchPlayer {
    max_depth: u8,
    rng: StdRng,
}

impl SearchPlayer {
    pub fn new() -> Self {
        SearchPlayer {
            max_depth: DEFAULT_SEARCH_DEPTH,
            rng: StdRng::from_os_rng(),
        }
    }

    fn is_blocked(turn: &Turn, target: Position) -> bool {
        !turn.grid.in_bounds(target) || turn.grid.get_cell(target).is_some()
    }

    fn explore(
        turn: &Turn,
        node: &Node,
        best_depth: &mut u8,
        decide: &mut dyn FnMut(Move, u8),
    ) -> Vec<Node> {
        let mut children = Vec::with_capacity(3);
        for mv in Move::all() {
            let heading = node.heading.rotate(mv);
            let target = node.target.step(heading);
            if Self::is_blocked(turn, target) {
                continue;
            }
            let child = Node {
                target,
                heading,
                // The root has no origin yet; its children become their own
                // origin, everything deeper inherits it.
                origin: if node.depth == 0 { mv } else { node.origin },
                depth: node.depth + 1,
            };
            if child.depth > *best_depth {
                *best_depth = child.depth;
                decide(child.origin, child.depth);
            }
            children.push(child);
        }
        children
    }
}

impl Default for SearchPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for SearchPlayer {
    fn init(&mut self, parameters: &serde_json::Value) -> Result<(), String> {
        let params: SearchParams = serde_json::from_value(parameters.clone())
            .map_err(|e| format!("invalid search parameters: {}", e))?;
        self.max_depth = params.depth.unwrap_or(DEFAULT_SEARCH_DEPTH);
        self.rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        debug!("search player initialized with max depth {}", self.max_depth);
        Ok(())
    }

    fn act(&mut self, turn: &Turn, decide: &mut dyn FnMut(Move, u8)) {
        let mut best_depth = 0u8;
        let mut frontier = vec![Node {
            target: turn.position,
            heading: turn.heading,
            origin: Move::Forward,
            depth: 0,
        }];

        for _ in 0..self.max_depth {
            let mut next = Vec::new();
            for node in &frontier {
                next.extend(Self::explore(turn, node, &mut best_depth, decide));
            }
            // Tie-break, not an optimization: which origin reaches the next
            // layer first must not be biased by generation order.
            next.shuffle(&mut self.rng);
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::types::{CorrelationId, PlayerId};
    use serde_json::json;

    fn turn_on(grid: Grid, position: Position, heading: Heading) -> Turn {
        Turn {
            correlation_id: CorrelationId::mint(),
            player_id: PlayerId(0),
            position,
            heading,
            grid,
        }
    }

    fn collect_decisions(player: &mut SearchPlayer, turn: &Turn) -> Vec<(Move, u8)> {
        let mut decisions = Vec::new();
        player.act(turn, &mut |mv, depth| decisions.push((mv, depth)));
        decisions
    }

    #[test]
    fn test_reported_depths_are_monotonically_increasing() {
        let mut player = SearchPlayer::new();
        player
            .init(&json!({ "depth": 6, "seed": 7 }))
            .expect("init should accept depth and seed");

        let turn = turn_on(
            Grid::new(15, 15),
            Position::new(7, 7),
            Heading { dx: 1, dy: 0 },
        );
        let decisions = collect_decisions(&mut player, &turn);

        assert!(!decisions.is_empty(), "open grid must yield decisions");
        for pair in decisions.windows(2) {
            assert!(
                pair[1].1 > pair[0].1,
                "depths must improve: {:?} then {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(
            decisions.last().map(|d| d.1),
            Some(6),
            "open 15x15 grid should reach the full configured depth"
        );
    }

    #[test]
    fn test_boxed_in_root_reports_nothing() {
        let mut grid = Grid::new(5, 5);
        // Wall off every cell adjacent to (2,2)
        for pos in [
            Position::new(1, 2),
            Position::new(3, 2),
            Position::new(2, 1),
            Position::new(2, 3),
        ] {
            grid.set_cell(PlayerId(9), pos);
        }
        let mut player = SearchPlayer::new();
        player.init(&json!({ "depth": 4, "seed": 1 })).unwrap();

        let turn = turn_on(grid, Position::new(2, 2), Heading { dx: 1, dy: 0 });
        let decisions = collect_decisions(&mut player, &turn);
        assert!(
            decisions.is_empty(),
            "a fully boxed-in root must report zero decisions, got {:?}",
            decisions
        );
    }

    #[test]
    fn test_pruning_limits_reported_depth() {
        // 3x1 corridor facing the wall at x=2: one forward step is possible,
        // then everything is off-grid (larboard/starboard leave y bounds).
        let grid = Grid::new(3, 1);
        let mut player = SearchPlayer::new();
        player.init(&json!({ "depth": 8, "seed": 3 })).unwrap();

        let turn = turn_on(grid, Position::new(1, 0), Heading { dx: 1, dy: 0 });
        let decisions = collect_decisions(&mut player, &turn);

        assert_eq!(decisions.len(), 1, "corridor allows exactly one level");
        assert_eq!(decisions[0], (Move::Forward, 1));
    }

    #[test]
    fn test_occupied_cells_are_pruned() {
        let mut grid = Grid::new(9, 9);
        // Block straight ahead; the first reported origin must be a turn
        grid.set_cell(PlayerId(8), Position::new(5, 4));
        let mut player = SearchPlayer::new();
        player.init(&json!({ "depth": 2, "seed": 5 })).unwrap();

        let turn = turn_on(grid, Position::new(4, 4), Heading { dx: 1, dy: 0 });
        let decisions = collect_decisions(&mut player, &turn);

        assert!(!decisions.is_empty());
        for (mv, _) in &decisions {
            assert_ne!(
                *mv,
                Move::Forward,
                "blocked forward cell must never be an origin"
            );
        }
    }

    #[test]
    fn test_same_seed_reports_same_decisions() {
        let turn = turn_on(
            Grid::new(11, 11),
            Position::new(5, 5),
            Heading { dx: 0, dy: 1 },
        );

        let mut first = SearchPlayer::new();
        first.init(&json!({ "depth": 5, "seed": 42 })).unwrap();
        let mut second = SearchPlayer::new();
        second.init(&json!({ "depth": 5, "seed": 42 })).unwrap();

        assert_eq!(
            collect_decisions(&mut first, &turn),
            collect_decisions(&mut second, &turn),
            "identical seeds must explore identically"
        );
    }

    #[test]
    fn test_init_rejects_malformed_parameters() {
        let mut player = SearchPlayer::new();
        assert!(player.init(&json!({ "depth": "very deep" })).is_err());
    }
}
