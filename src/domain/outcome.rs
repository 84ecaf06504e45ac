//! Outcome extraction
//!
//! Turns a game's two side scores into a structured result. Ties and missing
//! scores are never guessed; they stay indeterminate (`None`).

use serde::{Deserialize, Serialize};

use crate::domain::game::GameRecord;

/// A computed result: who won, who lost, and the full line score.
///
/// Two outcomes are equal exactly when all four label/score fields are equal;
/// winner and loser are derived from those fields, so the derived `PartialEq`
/// implements the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub winner: String,
    pub loser: String,
    pub home_label: String,
    pub home_points: u32,
    pub away_label: String,
    pub away_points: u32,
}

impl Outcome {
    /// Compute an outcome from two nullable scores. `None` when either score
    /// is missing or the game is tied.
    pub fn from_scores(
        home_label: &str,
        home_points: Option<u32>,
        away_label: &str,
        away_points: Option<u32>,
    ) -> Option<Self> {
        let home = home_points?;
        let away = away_points?;
        if home == away {
            return None;
        }

        let (winner, loser) = if home > away {
            (home_label, away_label)
        } else {
            (away_label, home_label)
        };

        Some(Self {
            winner: winner.to_string(),
            loser: loser.to_string(),
            home_label: home_label.to_string(),
            home_points: home,
            away_label: away_label.to_string(),
            away_points: away,
        })
    }

    pub fn from_record(record: &GameRecord) -> Option<Self> {
        Self::from_scores(
            &record.home_label,
            record.home_points,
            &record.away_label,
            record.away_points,
        )
    }

    /// One-line score summary for announcements, winner first
    pub fn summary(&self) -> String {
        let (winner_points, loser_points) = if self.winner == self.home_label {
            (self.home_points, self.away_points)
        } else {
            (self.away_points, self.home_points)
        };
        format!(
            "{} {} - {} {}",
            self.winner, winner_points, self.loser, loser_points
        )
    }
}
