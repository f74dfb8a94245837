// Turn orchestrator
//
// Drives the CLEAR -> RUNNING -> FINISHED state machine. Each tick issues one
// decision request per living participant under a shared correlation ID, then
// suspends for exactly the configured turn timeout; the deadline, not agent
// completion, is the synchronization point, so per-turn latency is constant
// and slow agents are simply cut off. Decision callbacks only mutate a
// per-participant latest-decision buffer; all resolution happens afterwards
// in a single phase, which is why the grid needs no locking.

use futures_util::future::join_all;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bot::{Bot, DecisionFn};
use crate::config::Config;
use crate::error::EngineError;
use crate::grid::Grid;
use crate::protocol::Turn;
use crate::tick_logger::{PlayerTickRecord, TickLogger};
use crate::types::{CorrelationId, GameStatus, Heading, Move, Performance, PlayerId, Position};

const SPAWN_ATTEMPTS: u32 = 1000;

struct Participant {
    bot: Bot,
    position: Position,
    heading: Heading,
    dead: bool,
    performance: Performance,
}

impl Participant {
    fn new(bot: Bot) -> Self {
        Participant {
            bot,
            position: Position::SENTINEL,
            heading: Heading::NONE,
            dead: false,
            performance: Performance::default(),
        }
    }
}

/// Latest decision received for one participant during the current tick;
/// overwritten by every callback, read once at the deadline
#[derive(Default)]
struct DecisionBuffer {
    mv: Option<Move>,
    depth: u8,
    duration: Duration,
}

/// The game engine: owns the grid, the participants and their agent handles
pub struct Game {
    grid: Grid,
    turn_timeout: Duration,
    status: GameStatus,
    players: Vec<Participant>,
    rng: StdRng,
    tick_count: u64,
    logger: TickLogger,
}

impl Game {
    /// Builds a game over an OS-seeded random source
    pub fn new(size_x: i32, size_y: i32, turn_timeout: Duration, bots: Vec<Bot>) -> Self {
        Self::build(size_x, size_y, turn_timeout, StdRng::from_os_rng(), bots)
    }

    /// Builds a game over an explicitly seeded random source, for
    /// reproducible spawn placement
    pub fn with_seed(
        size_x: i32,
        size_y: i32,
        turn_timeout: Duration,
        seed: u64,
        bots: Vec<Bot>,
    ) -> Self {
        Self::build(size_x, size_y, turn_timeout, StdRng::seed_from_u64(seed), bots)
    }

    /// Builds a game from a loaded configuration
    pub fn from_config(config: &Config, bots: Vec<Bot>) -> Self {
        let rng = match config.random.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::build(
            config.grid.size_x,
            config.grid.size_y,
            config.timing.turn_timeout(),
            rng,
            bots,
        )
    }

    fn build(
        size_x: i32,
        size_y: i32,
        turn_timeout: Duration,
        rng: StdRng,
        bots: Vec<Bot>,
    ) -> Self {
        Game {
            grid: Grid::new(size_x, size_y),
            turn_timeout,
            status: GameStatus::Clear,
            players: bots.into_iter().map(Participant::new).collect(),
            rng,
            tick_count: 0,
            logger: TickLogger::disabled(),
        }
    }

    /// Installs an optional per-tick JSONL trace logger
    pub fn set_tick_logger(&mut self, logger: TickLogger) {
        self.logger = logger;
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.bot.id()).collect()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Places every participant on a random free non-border cell, boots all
    /// agents concurrently under one fresh correlation ID and transitions to
    /// RUNNING once every boot succeeded.
    ///
    /// Valid from CLEAR or FINISHED only. If any boot fails the whole start
    /// fails: round state is rolled back and the error propagates, so the
    /// caller may retry.
    pub async fn start(&mut self) -> Result<GameStatus, EngineError> {
        match self.status {
            GameStatus::Running => return Err(EngineError::AlreadyStarted),
            GameStatus::Clear | GameStatus::Finished => {}
        }
        self.clear_round_state();

        for i in 0..self.players.len() {
            let (position, heading) = self.random_spawn()?;
            let id = self.players[i].bot.id();
            self.players[i].position = position;
            self.players[i].heading = heading;
            self.grid.set_cell(id, position);
            debug!("{} spawned at {}", id, position);
        }

        let correlation_id = CorrelationId::mint();
        info!(
            "booting {} agents ({})",
            self.players.len(),
            correlation_id
        );
        let boots = join_all(
            self.players
                .iter_mut()
                .map(|p| p.bot.boot(correlation_id)),
        )
        .await;
        if let Some(err) = boots.into_iter().find_map(|r| r.err()) {
            warn!("start aborted, boot failed: {}", err);
            for p in &self.players {
                p.bot.destroy();
            }
            self.clear_round_state();
            return Err(err);
        }

        self.status = GameStatus::Running;
        Ok(self.status)
    }

    /// Runs one turn: request decisions from every living agent, wait out
    /// the turn timeout, then resolve all buffered moves atomically.
    ///
    /// Valid only while RUNNING. A fatal agent fault observed during the
    /// tick does not abort resolution (the faulted participant falls back to
    /// its default move and its handle is rebooted with the stragglers) but
    /// it is returned as the tick's error so the caller sees it.
    pub async fn tick(&mut self) -> Result<GameStatus, EngineError> {
        if self.status != GameStatus::Running {
            return Err(EngineError::NotRunning);
        }
        self.tick_count += 1;
        let correlation_id = CorrelationId::mint();
        debug!("tick {} ({})", self.tick_count, correlation_id);

        // Issue every request without waiting; the deadline below is the
        // only synchronization point.
        let mut faults: Vec<EngineError> = Vec::new();
        let mut buffers: Vec<Option<Arc<Mutex<DecisionBuffer>>>> =
            Vec::with_capacity(self.players.len());
        for i in 0..self.players.len() {
            if self.players[i].dead {
                buffers.push(None);
                continue;
            }
            let turn = Turn {
                correlation_id,
                player_id: self.players[i].bot.id(),
                position: self.players[i].position,
                heading: self.players[i].heading,
                grid: self.grid.clone(),
            };
            let buffer = Arc::new(Mutex::new(DecisionBuffer::default()));
            let sink = Arc::clone(&buffer);
            let requested_at = Instant::now();
            let on_decision: DecisionFn = Box::new(move |corr, mv, depth| {
                if corr != correlation_id {
                    debug!("dropping decision from superseded tick ({})", corr);
                    return;
                }
                let mut buffer = sink.lock();
                buffer.mv = Some(mv);
                buffer.depth = depth;
                buffer.duration = requested_at.elapsed();
            });
            if let Err(err) = self.players[i].bot.request_action(turn, on_decision) {
                // An unrequestable agent is treated like a silent one: it
                // moves straight and gets rebooted with the stragglers.
                warn!("{}: decision request failed: {}", self.players[i].bot.id(), err);
                faults.push(err);
            }
            buffers.push(Some(buffer));
        }

        tokio::time::sleep(self.turn_timeout).await;

        // Snapshot the buffers at the deadline; no decision means forward.
        let decisions: Vec<Option<(Move, Performance)>> = buffers
            .iter()
            .map(|slot| {
                slot.as_ref().map(|buffer| {
                    let buffer = buffer.lock();
                    (
                        buffer.mv.unwrap_or_default(),
                        Performance {
                            depth: buffer.depth,
                            duration_ms: buffer.duration.as_millis() as u64,
                        },
                    )
                })
            })
            .collect();

        self.resolve_turn(&decisions);
        self.log_tick();

        faults.extend(self.players.iter().filter_map(|p| p.bot.take_fault()));

        if self.status == GameStatus::Finished {
            info!("game finished after {} ticks", self.tick_count);
            for p in &self.players {
                p.bot.destroy();
            }
        } else {
            for p in self.players.iter().filter(|p| p.dead) {
                p.bot.destroy();
            }
            // A handle still mid-search past the deadline is rebooted, not
            // left running; its late messages carry a superseded correlation
            // ID and are dropped by the router.
            let reboot_correlation = CorrelationId::mint();
            let reboots = join_all(
                self.players
                    .iter_mut()
                    .filter(|p| !p.dead && !p.bot.is_idle())
                    .map(|p| {
                        debug!("{} not idle at deadline, rebooting", p.bot.id());
                        p.bot.boot(reboot_correlation)
                    }),
            )
            .await;
            faults.extend(reboots.into_iter().filter_map(|r| r.err()));
        }

        match faults.into_iter().next() {
            Some(fault) => Err(fault),
            None => Ok(self.status),
        }
    }

    /// Destroys all agent handles and returns to CLEAR; the grid and all
    /// transient participant state are cleared but identities and handles
    /// are kept for reuse. Valid from any state.
    pub fn reset(&mut self) -> GameStatus {
        for p in &self.players {
            p.bot.destroy();
        }
        self.clear_round_state();
        self.status = GameStatus::Clear;
        self.status
    }

    pub fn is_dead(&self, id: PlayerId) -> Result<bool, EngineError> {
        Ok(self.participant(id)?.dead)
    }

    pub fn position(&self, id: PlayerId) -> Result<Position, EngineError> {
        Ok(self.participant(id)?.position)
    }

    pub fn performance(&self, id: PlayerId) -> Result<Performance, EngineError> {
        Ok(self.participant(id)?.performance)
    }

    fn participant(&self, id: PlayerId) -> Result<&Participant, EngineError> {
        self.players
            .iter()
            .find(|p| p.bot.id() == id)
            .ok_or(EngineError::UnknownPlayer(id))
    }

    fn clear_round_state(&mut self) {
        self.grid.reset();
        self.tick_count = 0;
        for p in &mut self.players {
            p.position = Position::SENTINEL;
            p.heading = Heading::NONE;
            p.dead = false;
            p.performance = Performance::default();
        }
    }

    /// Picks a random unoccupied non-border cell and a synthetic heading,
    /// as if the participant had just stepped in from a neighboring cell
    fn random_spawn(&mut self) -> Result<(Position, Heading), EngineError> {
        if self.grid.size_x < 3 || self.grid.size_y < 3 {
            return Err(EngineError::SpawnExhausted { attempts: 0 });
        }
        for _ in 0..SPAWN_ATTEMPTS {
            let x = self.rng.random_range(1..self.grid.size_x - 1);
            let y = self.rng.random_range(1..self.grid.size_y - 1);
            let position = Position::new(x, y);
            if self.grid.get_cell(position).is_some() {
                continue;
            }
            let headings = Heading::all();
            let heading = headings[self.rng.random_range(0..headings.len())];
            return Ok((position, heading));
        }
        Err(EngineError::SpawnExhausted {
            attempts: SPAWN_ATTEMPTS,
        })
    }

    /// Applies one buffered move per living participant, stamps the grid,
    /// then computes eliminations and the termination condition.
    ///
    /// Trail hits, head-on swaps into the same cell and simultaneous
    /// arrivals all surface the same way: the new position is either out of
    /// bounds or its occupant list holds more than one entry. All colliding
    /// parties die, never just one.
    fn resolve_turn(&mut self, decisions: &[Option<(Move, Performance)>]) {
        for (i, slot) in decisions.iter().enumerate() {
            let Some((mv, performance)) = slot else {
                continue;
            };
            let p = &mut self.players[i];
            p.performance = *performance;
            p.heading = p.heading.rotate(*mv);
            p.position = p.position.step(p.heading);
            let id = p.bot.id();
            let position = p.position;
            debug!("{} moves {} to {}", id, mv.as_str(), position);
            self.grid.set_cell(id, position);
        }

        for (i, slot) in decisions.iter().enumerate() {
            if slot.is_none() {
                continue;
            }
            let position = self.players[i].position;
            let crowded = self
                .grid
                .get_cell(position)
                .is_some_and(|ids| ids.len() > 1);
            if !self.grid.in_bounds(position) || crowded {
                let p = &mut self.players[i];
                p.dead = true;
                info!("{} eliminated at {}", p.bot.id(), position);
            }
        }

        let alive = self.players.iter().filter(|p| !p.dead).count();
        if alive < 2 {
            self.status = GameStatus::Finished;
        }
    }

    fn log_tick(&self) {
        let records: Vec<PlayerTickRecord> = self
            .players
            .iter()
            .map(|p| PlayerTickRecord {
                id: p.bot.id(),
                position: p.position,
                alive: !p.dead,
                performance: p.performance,
            })
            .collect();
        self.logger.log_tick(self.tick_count, self.status, records);
    }
}
