pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;

pub use adapters::{RetryPolicy, RosterSource, ScoreSource, SportradarClient};
pub use config::AppConfig;
pub use domain::{GameRecord, GameStatus, Outcome};
pub use engine::{FinalityVerifier, PollDriver};
pub use error::{Result, ScorewatchError};
pub use persistence::{EventLog, GamePhase, GameStateStore};
