//! Raw status classification
//!
//! The scores feed spells game state in several ways depending on sport and
//! coverage level; the engine only acts on three classes.

use serde::{Deserialize, Serialize};

/// Classified game status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Scheduled, postponed, or anything else the vocabulary does not cover
    Unknown,
    InProgress,
    Final,
}

impl GameStatus {
    /// Classify a raw, possibly absent status string.
    ///
    /// Case-insensitive and substring-tolerant: "Final", "Final/Over", "F",
    /// "F/OT", "complete", and "closed" all count as final; "InProgress",
    /// "in progress", and "live" count as in progress.
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unknown;
        };
        let s = raw.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Self::Unknown;
        }

        if s.contains("final")
            || s.contains("complete")
            || s == "f"
            || s.starts_with("f/")
            || s == "closed"
        {
            return Self::Final;
        }

        if s.contains("inprogress") || s.contains("in progress") || s == "live" {
            return Self::InProgress;
        }

        Self::Unknown
    }
}
