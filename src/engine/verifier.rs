//! Finality detection and verification state machine
//!
//! Pure transition logic over the game state store: no I/O and no clock
//! reads. The poll driver feeds it observations along with the current
//! instant, which keeps every window rule directly testable.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::{GameRecord, GameStatus, Outcome};
use crate::persistence::{GamePhase, GameStateStore};

/// State change produced by one observation or window sweep
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Game seen final for the first time; verification window opened
    Finalized { outcome: Option<Outcome> },
    /// Outcome moved while the window was open; window restarted
    Corrected {
        previous: Option<Outcome>,
        current: Option<Outcome>,
    },
    /// Window elapsed untouched; terminal
    Verified { outcome: Option<Outcome> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifierEvent {
    pub game_id: String,
    pub watch_date: NaiveDate,
    pub matchup: String,
    pub transition: Transition,
}

/// Applies the finality lifecycle rules to observed games
pub struct FinalityVerifier {
    window: Duration,
}

impl FinalityVerifier {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs as i64))
    }

    /// Fold one observation into the store. Returns the lifecycle event the
    /// observation caused, if any.
    ///
    /// Finality triggers on the in-progress to final transition, or on a game
    /// whose very first observation is already final. A game first seen in
    /// some other state that later shows up final without ever being observed
    /// in progress stays idle.
    pub fn process_observation(
        &self,
        store: &mut GameStateStore,
        record: &GameRecord,
        now: DateTime<Utc>,
    ) -> Option<VerifierEvent> {
        let status = GameStatus::classify(record.status.as_deref());
        let previous = store.record_observed_status(record, status);

        match store.phase(&record.id) {
            GamePhase::Idle => {
                let finality_trigger = status == GameStatus::Final
                    && matches!(previous, None | Some(GameStatus::InProgress));
                if !finality_trigger {
                    return None;
                }

                let outcome = Outcome::from_record(record);
                store.begin_verification(&record.id, now, outcome.clone());
                Some(VerifierEvent {
                    game_id: record.id.clone(),
                    watch_date: record.watch_date,
                    matchup: record.matchup(),
                    transition: Transition::Finalized { outcome },
                })
            }
            GamePhase::Watching { baseline, .. } => {
                // An absent outcome and a present one are different answers,
                // so a null baseline gaining scores restarts the window too.
                let current = Outcome::from_record(record);
                if current == baseline {
                    return None;
                }

                store.extend_verification(&record.id, now, current.clone());
                Some(VerifierEvent {
                    game_id: record.id.clone(),
                    watch_date: record.watch_date,
                    matchup: record.matchup(),
                    transition: Transition::Corrected {
                        previous: baseline,
                        current,
                    },
                })
            }
            GamePhase::Verified { .. } => None,
        }
    }

    /// Close every window that has run its course. Swept over the whole
    /// store rather than the fetched schedule, so a game that rolls off the
    /// watch dates still verifies. Games keyed to a date whose fetch failed
    /// this cycle are left untouched; their windows wait for the next
    /// successful fetch, which still gets a chance to post a correction.
    pub fn sweep_due(
        &self,
        store: &mut GameStateStore,
        now: DateTime<Utc>,
        failed_dates: &[NaiveDate],
    ) -> Vec<VerifierEvent> {
        let due: Vec<(String, NaiveDate, String, Option<Outcome>)> = store
            .tracked()
            .filter(|game| !failed_dates.contains(&game.watch_date))
            .filter_map(|game| match &game.phase {
                GamePhase::Watching {
                    window_started_at,
                    baseline,
                } if now - *window_started_at >= self.window => Some((
                    game.game_id.clone(),
                    game.watch_date,
                    game.matchup(),
                    baseline.clone(),
                )),
                _ => None,
            })
            .collect();

        due.into_iter()
            .map(|(game_id, watch_date, matchup, outcome)| {
                store.end_verification(&game_id, outcome.clone());
                VerifierEvent {
                    game_id,
                    watch_date,
                    matchup,
                    transition: Transition::Verified { outcome },
                }
            })
            .collect()
    }
}
