// Library exports for the trail arena engine
// This allows the headless runner and integration tests to use the core logic

pub mod bot;
pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod player;
pub mod protocol;
pub mod tick_logger;
pub mod types;
pub mod worker;
