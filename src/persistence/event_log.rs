//! Append-only JSONL history of lifecycle events
//!
//! Every finalization, correction, and verification lands here as one JSON
//! object per line, so the full history survives state-file snapshots and
//! can be replayed or audited with standard line tools.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::domain::Outcome;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Game reached final for the first time
    Final { outcome: Option<Outcome> },
    /// Outcome changed while the verification window was open
    Correction {
        previous: Option<Outcome>,
        current: Option<Outcome>,
    },
    /// Verification window elapsed with no further changes
    Verified { outcome: Option<Outcome> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub game_id: String,
    pub watch_date: NaiveDate,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Append-only event sink
pub struct EventLog {
    log_path: PathBuf,
}

impl EventLog {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append one event as a single JSON line
    pub async fn append(&self, entry: &EventLogEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
