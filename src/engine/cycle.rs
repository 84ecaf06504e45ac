//! One poll cycle: fetch the watch dates, fold observations, sweep windows,
//! flush state
//!
//! A cycle never aborts halfway. Fetch failures are scoped to their date and
//! the rest of the cycle still runs; windows on a date whose fetch failed
//! are held open until that date is fetched successfully again.

use chrono::{DateTime, Duration, Local, NaiveDate, Timelike, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::adapters::ScoreSource;
use crate::domain::Outcome;
use crate::engine::verifier::{FinalityVerifier, Transition, VerifierEvent};
use crate::error::Result;
use crate::persistence::{EventKind, EventLog, EventLogEntry, GamePhase, GameStateStore};

/// Dates worth polling right now. An explicit override wins; otherwise today,
/// plus yesterday before local noon so late games that crossed midnight can
/// still finish their verification.
pub fn watch_dates(
    now_local: DateTime<Local>,
    override_date: Option<NaiveDate>,
) -> Vec<NaiveDate> {
    if let Some(date) = override_date {
        return vec![date];
    }

    let today = now_local.date_naive();
    let mut dates = vec![today];
    if now_local.hour() < 12 {
        dates.push(today - Duration::days(1));
    }
    dates
}

/// What one cycle did, for the loop's own logging
#[derive(Debug, Default)]
pub struct CycleReport {
    pub dates_polled: usize,
    pub games_seen: usize,
    pub finalized: usize,
    pub corrected: usize,
    pub verified: usize,
    pub fetch_failures: usize,
}

/// Drives the verifier from the scores feed, one cycle at a time.
///
/// The driver owns the store outright; every mutation happens inside
/// `run_cycle`, so there is no locking anywhere in the lifecycle.
pub struct PollDriver {
    source: Box<dyn ScoreSource>,
    verifier: FinalityVerifier,
    store: GameStateStore,
    events: EventLog,
    override_date: Option<NaiveDate>,
}

impl PollDriver {
    pub fn new(
        source: Box<dyn ScoreSource>,
        verifier: FinalityVerifier,
        store: GameStateStore,
        events: EventLog,
        override_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            source,
            verifier,
            store,
            events,
            override_date,
        }
    }

    /// Recover tracking state from the last snapshot
    pub async fn restore(&mut self) -> Result<()> {
        self.store.load().await
    }

    /// Persist tracking state (also done at the end of every cycle)
    pub async fn flush(&self) -> Result<()> {
        self.store.save().await
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    /// Run one full poll cycle at the given instant. Failures are logged and
    /// absorbed; the loop always gets a report back.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>, now_local: DateTime<Local>) -> CycleReport {
        let mut report = CycleReport::default();
        let dates = watch_dates(now_local, self.override_date);
        report.dates_polled = dates.len();

        let fetches = join_all(dates.iter().map(|d| self.source.games_for_date(*d))).await;

        let mut failed_dates: Vec<NaiveDate> = Vec::new();
        for (date, result) in dates.iter().zip(fetches) {
            match result {
                Ok(games) => {
                    report.games_seen += games.len();
                    for game in &games {
                        if let Some(event) =
                            self.verifier.process_observation(&mut self.store, game, now)
                        {
                            self.handle_event(now, &event, &mut report).await;
                        }
                    }
                }
                Err(e) => {
                    report.fetch_failures += 1;
                    failed_dates.push(*date);
                    warn!("Schedule fetch for {} failed: {}", date, e);
                }
            }
        }

        for event in self.verifier.sweep_due(&mut self.store, now, &failed_dates) {
            self.handle_event(now, &event, &mut report).await;
        }

        if let Err(e) = self.store.save().await {
            error!("Failed to save game state: {}", e);
        }

        let watching = self
            .store
            .tracked()
            .filter(|g| matches!(g.phase, GamePhase::Watching { .. }))
            .count();
        debug!(
            "Cycle done: {} dates polled, {} games seen, {} in verification, {} fetch failures",
            report.dates_polled, report.games_seen, watching, report.fetch_failures
        );
        report
    }

    async fn handle_event(
        &self,
        now: DateTime<Utc>,
        event: &VerifierEvent,
        report: &mut CycleReport,
    ) {
        match &event.transition {
            Transition::Finalized { outcome } => {
                report.finalized += 1;
                match outcome {
                    Some(o) => info!("🏁 {} is final: {}", event.matchup, o.summary()),
                    None => info!("🏁 {} is final (scores unavailable)", event.matchup),
                }
            }
            Transition::Corrected { previous, current } => {
                report.corrected += 1;
                warn!(
                    "🔄 Correction for {}: {} -> {}, verification restarted",
                    event.matchup,
                    describe(previous),
                    describe(current)
                );
            }
            Transition::Verified { outcome } => {
                report.verified += 1;
                match outcome {
                    Some(o) => info!("✅ Verified: {} ({})", event.matchup, o.summary()),
                    None => info!("✅ Verified: {} (no recorded outcome)", event.matchup),
                }
            }
        }

        let kind = match event.transition.clone() {
            Transition::Finalized { outcome } => EventKind::Final { outcome },
            Transition::Corrected { previous, current } => {
                EventKind::Correction { previous, current }
            }
            Transition::Verified { outcome } => EventKind::Verified { outcome },
        };
        let entry = EventLogEntry {
            timestamp: now,
            game_id: event.game_id.clone(),
            watch_date: event.watch_date,
            kind,
        };
        if let Err(e) = self.events.append(&entry).await {
            warn!("Failed to append event log entry: {}", e);
        }
    }
}

fn describe(outcome: &Option<Outcome>) -> String {
    match outcome {
        Some(o) => o.summary(),
        None => "no outcome".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_watch_dates_override_wins() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let now = Local.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap();
        assert_eq!(watch_dates(now, Some(date)), vec![date]);
    }

    #[test]
    fn test_watch_dates_morning_includes_yesterday() {
        let now = Local.with_ymd_and_hms(2025, 1, 5, 9, 30, 0).unwrap();
        assert_eq!(
            watch_dates(now, None),
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            ]
        );
    }

    #[test]
    fn test_watch_dates_afternoon_is_today_only() {
        let now = Local.with_ymd_and_hms(2025, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(
            watch_dates(now, None),
            vec![NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()]
        );
    }

    #[test]
    fn test_watch_dates_crosses_month_boundary() {
        let now = Local.with_ymd_and_hms(2025, 2, 1, 1, 0, 0).unwrap();
        assert_eq!(
            watch_dates(now, None),
            vec![
                NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            ]
        );
    }
}
