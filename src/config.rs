// Configuration module for reading Trail.toml
//
// Grid dimensions, turn timing, the random seed and the default player
// roster all live in one TOML file at the project root, with hardcoded
// fallbacks when the file is missing or malformed.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub grid: GridConfig,
    pub timing: TimingConfig,
    pub random: RandomConfig,
    pub debug: DebugConfig,
    pub players: Vec<PlayerConfig>,
}

/// Play field dimensions
#[derive(Debug, Deserialize, Clone)]
pub struct GridConfig {
    pub size_x: i32,
    pub size_y: i32,
}

/// Turn timing and auto-run behavior
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Shared deadline for every decision request in a tick
    pub turn_timeout_ms: u64,
    /// Whether the runner starts a fresh round after each finished one
    pub auto_run: bool,
    /// Pause between auto-run rounds
    pub auto_run_wait_ms: u64,
}

impl TimingConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }
}

/// Seed for spawn placement; omit for an OS-seeded source
#[derive(Debug, Deserialize, Clone)]
pub struct RandomConfig {
    pub seed: Option<u64>,
}

/// Tick trace logging
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

/// One participant in the default roster
#[derive(Debug, Deserialize, Clone)]
pub struct PlayerConfig {
    /// Maximum lookahead depth for the search agent
    pub depth: u8,
    /// Per-agent shuffle seed; omit for an OS-seeded source
    pub seed: Option<u64>,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Trail.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Trail.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Trail.toml
    pub fn default_hardcoded() -> Self {
        Config {
            grid: GridConfig {
                size_x: 20,
                size_y: 20,
            },
            timing: TimingConfig {
                turn_timeout_ms: 50,
                auto_run: false,
                auto_run_wait_ms: 1000,
            },
            random: RandomConfig { seed: None },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "trail_arena_ticks.jsonl".to_string(),
            },
            players: vec![
                PlayerConfig {
                    depth: 3,
                    seed: None,
                },
                PlayerConfig {
                    depth: 3,
                    seed: None,
                },
                PlayerConfig {
                    depth: 8,
                    seed: None,
                },
            ],
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            eprintln!(
                "Warning: Could not load Trail.toml ({}), using hardcoded defaults",
                e
            );
            Self::default_hardcoded()
        })
    }
}
