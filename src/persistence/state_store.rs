//! Per-game tracking state with crash recovery
//!
//! The store is a plain owned map mutated from the poll loop only; there is
//! no shared-state locking. Snapshots are written atomically (temp file then
//! rename) so a crash mid-save never leaves a truncated state file behind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::domain::{GameRecord, GameStatus, Outcome};
use crate::error::Result;

// ── Tracking state ──────────────────────────────────────────────

/// Where a game sits in the finality lifecycle.
///
/// A game is considered finalized exactly when it has left `Idle`; there is
/// no separate flag to fall out of sync with the window bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GamePhase {
    /// Not yet finalized
    #[default]
    Idle,
    /// Finalized, waiting out the verification window
    Watching {
        window_started_at: DateTime<Utc>,
        /// Outcome captured at finalization, or at the latest correction.
        /// `None` when the feed went final without usable scores.
        baseline: Option<Outcome>,
    },
    /// Window elapsed without a pending correction; terminal
    Verified { outcome: Option<Outcome> },
}

/// One game's observation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedGame {
    pub game_id: String,
    pub watch_date: NaiveDate,
    pub home_label: String,
    pub away_label: String,
    /// Classified status from the most recent observation
    #[serde(default)]
    pub last_status: Option<GameStatus>,
    #[serde(default)]
    pub phase: GamePhase,
}

impl TrackedGame {
    fn from_record(record: &GameRecord) -> Self {
        Self {
            game_id: record.id.clone(),
            watch_date: record.watch_date,
            home_label: record.home_label.clone(),
            away_label: record.away_label.clone(),
            last_status: None,
            phase: GamePhase::Idle,
        }
    }

    pub fn matchup(&self) -> String {
        format!("{} at {}", self.away_label, self.home_label)
    }
}

/// On-disk snapshot shape
#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    games: BTreeMap<String, TrackedGame>,
}

// ── Store ───────────────────────────────────────────────────────

/// Owned per-game state keyed by feed identifier
pub struct GameStateStore {
    state_path: PathBuf,
    games: BTreeMap<String, TrackedGame>,
}

impl GameStateStore {
    pub fn new(state_path: PathBuf) -> Self {
        Self {
            state_path,
            games: BTreeMap::new(),
        }
    }

    /// Load the snapshot from disk. A missing file is a fresh start; an
    /// unreadable or corrupt file is logged and abandoned rather than
    /// crashing the watcher.
    pub async fn load(&mut self) -> Result<()> {
        let bytes = match tokio::fs::read(&self.state_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No existing state file, starting fresh");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "State file {:?} is unreadable, starting fresh: {}",
                    self.state_path, e
                );
                self.games.clear();
                return Ok(());
            }
        };

        match serde_json::from_slice::<PersistedState>(&bytes) {
            Ok(state) => {
                info!(
                    "Restored {} tracked games (saved at {})",
                    state.games.len(),
                    state.saved_at
                );
                self.games = state.games;
            }
            Err(e) => {
                warn!(
                    "State file {:?} is corrupt, starting fresh: {}",
                    self.state_path, e
                );
                self.games.clear();
            }
        }
        Ok(())
    }

    /// Write the snapshot atomically: temp sibling first, then rename.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = PersistedState {
            saved_at: Utc::now(),
            games: self.games.clone(),
        };
        let content = serde_json::to_string_pretty(&state)?;

        let tmp_path = self.state_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.state_path).await?;

        debug!("Saved {} tracked games to {:?}", self.games.len(), self.state_path);
        Ok(())
    }

    pub fn get(&self, game_id: &str) -> Option<&TrackedGame> {
        self.games.get(game_id)
    }

    pub fn phase(&self, game_id: &str) -> GamePhase {
        self.games
            .get(game_id)
            .map(|g| g.phase.clone())
            .unwrap_or_default()
    }

    /// Finalized means the game has left `Idle`
    pub fn finalized(&self, game_id: &str) -> bool {
        !matches!(self.phase(game_id), GamePhase::Idle)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &TrackedGame> {
        self.games.values()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Record this cycle's classified status for a game, upserting the
    /// tracking entry. Returns the previous observation so the caller can
    /// evaluate status transitions after the update.
    pub fn record_observed_status(
        &mut self,
        record: &GameRecord,
        status: GameStatus,
    ) -> Option<GameStatus> {
        let game = self
            .games
            .entry(record.id.clone())
            .or_insert_with(|| TrackedGame::from_record(record));
        game.home_label = record.home_label.clone();
        game.away_label = record.away_label.clone();
        game.last_status.replace(status)
    }

    /// Open the verification window with the freshly captured baseline
    pub fn begin_verification(
        &mut self,
        game_id: &str,
        now: DateTime<Utc>,
        baseline: Option<Outcome>,
    ) {
        if let Some(game) = self.games.get_mut(game_id) {
            game.phase = GamePhase::Watching {
                window_started_at: now,
                baseline,
            };
        }
    }

    /// Restart the window after a correction, adopting the corrected outcome
    /// as the new baseline
    pub fn extend_verification(
        &mut self,
        game_id: &str,
        now: DateTime<Utc>,
        new_baseline: Option<Outcome>,
    ) {
        if let Some(game) = self.games.get_mut(game_id) {
            game.phase = GamePhase::Watching {
                window_started_at: now,
                baseline: new_baseline,
            };
        }
    }

    /// Close out a fully quiet window
    pub fn end_verification(&mut self, game_id: &str, outcome: Option<Outcome>) {
        if let Some(game) = self.games.get_mut(game_id) {
            game.phase = GamePhase::Verified { outcome };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            status: Some("inprogress".to_string()),
            home_label: "Denver Nuggets".to_string(),
            away_label: "Los Angeles Lakers".to_string(),
            home_points: Some(98),
            away_points: Some(104),
            watch_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
        }
    }

    #[test]
    fn test_record_observed_status_returns_previous() {
        let mut store = GameStateStore::new(PathBuf::from("unused.json"));
        let rec = record("g1");

        assert_eq!(
            store.record_observed_status(&rec, GameStatus::InProgress),
            None
        );
        assert_eq!(
            store.record_observed_status(&rec, GameStatus::Final),
            Some(GameStatus::InProgress)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_phase_transitions() {
        let mut store = GameStateStore::new(PathBuf::from("unused.json"));
        let rec = record("g1");
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 22, 0, 0).unwrap();
        let outcome = Outcome::from_record(&rec);

        store.record_observed_status(&rec, GameStatus::Final);
        assert!(!store.finalized("g1"));

        store.begin_verification("g1", now, outcome.clone());
        assert!(store.finalized("g1"));
        assert_eq!(
            store.phase("g1"),
            GamePhase::Watching {
                window_started_at: now,
                baseline: outcome.clone(),
            }
        );

        store.end_verification("g1", outcome.clone());
        assert_eq!(store.phase("g1"), GamePhase::Verified { outcome });
    }

    #[test]
    fn test_unknown_game_is_idle() {
        let store = GameStateStore::new(PathBuf::from("unused.json"));
        assert_eq!(store.phase("nope"), GamePhase::Idle);
        assert!(!store.finalized("nope"));
    }

    #[test]
    fn test_phase_serde_shape() {
        let phase = GamePhase::Watching {
            window_started_at: Utc.with_ymd_and_hms(2025, 1, 5, 22, 0, 0).unwrap(),
            baseline: None,
        };
        let json = serde_json::to_string(&phase).unwrap();
        assert!(json.contains(r#""phase":"watching""#), "{json}");

        let back: GamePhase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, phase);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("game_state.json");
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 22, 0, 0).unwrap();
        let rec = record("g1");
        let outcome = Outcome::from_record(&rec);

        let mut store = GameStateStore::new(path.clone());
        store.record_observed_status(&rec, GameStatus::Final);
        store.begin_verification("g1", now, outcome.clone());
        store.save().await.unwrap();

        // No temp file left behind
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let mut restored = GameStateStore::new(path);
        restored.load().await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(
            restored.phase("g1"),
            GamePhase::Watching {
                window_started_at: now,
                baseline: outcome,
            }
        );
        assert_eq!(
            restored.get("g1").unwrap().last_status,
            Some(GameStatus::Final)
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GameStateStore::new(dir.path().join("nothing_here.json"));
        store.load().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_state.json");
        tokio::fs::write(&path, "{not json at all").await.unwrap();

        let mut store = GameStateStore::new(path);
        store.load().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_non_utf8_file_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_state.json");
        tokio::fs::write(&path, [0xff_u8, 0xfe, 0x7b, 0x80]).await.unwrap();

        let mut store = GameStateStore::new(path);
        store.load().await.unwrap();
        assert!(store.is_empty());
    }
}
