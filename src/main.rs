// Headless runner: builds the configured roster, plays rounds and logs the
// outcome of every tick. This is the only binary surface; the engine itself
// lives in the library.

use log::{info, warn};
use serde_json::json;
use std::env;
use std::time::Duration;

use trail_arena::bot::Bot;
use trail_arena::config::Config;
use trail_arena::error::EngineError;
use trail_arena::game::Game;
use trail_arena::player::SearchPlayer;
use trail_arena::tick_logger::TickLogger;
use trail_arena::types::{GameStatus, PlayerId};

#[tokio::main]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment
    // variable is set, we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!("Starting trail arena...");

    let config = Config::load_or_default();
    let bots: Vec<Bot> = config
        .players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            Bot::new(
                PlayerId(i as u32),
                Box::new(|| Box::new(SearchPlayer::new())),
                json!({ "depth": player.depth, "seed": player.seed }),
            )
        })
        .collect();

    let mut game = Game::from_config(&config, bots);
    game.set_tick_logger(TickLogger::new(config.debug.enabled, &config.debug.log_file_path).await);

    loop {
        if let Err(e) = run_round(&mut game).await {
            warn!("round aborted: {}", e);
        }
        if !config.timing.auto_run {
            break;
        }
        tokio::time::sleep(Duration::from_millis(config.timing.auto_run_wait_ms)).await;
        game.reset();
    }
}

/// Plays one round to completion, then reports every participant's fate
async fn run_round(game: &mut Game) -> Result<(), EngineError> {
    game.start().await?;
    info!("round started with {} players", game.player_ids().len());

    while game.status() == GameStatus::Running {
        if let Err(e) = game.tick().await {
            // Fatal agent faults do not stop the round: the faulted agent
            // moved straight and was rebooted, so just keep playing.
            warn!("tick fault: {}", e);
        }
    }

    for id in game.player_ids() {
        let fate = if game.is_dead(id)? {
            "eliminated"
        } else {
            "survived"
        };
        let position = game.position(id)?;
        let performance = game.performance(id)?;
        info!(
            "{}: {} at {} (depth {}, {} ms)",
            id, fate, position, performance.depth, performance.duration_ms
        );
    }
    Ok(())
}
