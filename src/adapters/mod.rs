use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::GameRecord;
use crate::error::Result;

pub mod sportradar;

pub use sportradar::{RetryPolicy, SportradarClient, TeamEntry, TeamsDocument};

/// Anything that can produce the day's games for a watch-date.
///
/// The poll driver only talks to this seam, so tests can script a source.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn games_for_date(&self, date: NaiveDate) -> Result<Vec<GameRecord>>;
}

/// Team roster fetches for the one-shot collector command
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn full_roster(&self, team_id: &str) -> Result<serde_json::Value>;
}
