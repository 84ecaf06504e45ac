use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

use scorewatch::adapters::ScoreSource;
use scorewatch::domain::GameRecord;
use scorewatch::engine::{FinalityVerifier, PollDriver};
use scorewatch::error::ScorewatchError;
use scorewatch::persistence::{EventKind, EventLog, EventLogEntry, GamePhase, GameStateStore};

/// Feed stub replaying one scripted response per cycle.
struct ScriptedSource {
    cycles: Mutex<VecDeque<scorewatch::error::Result<Vec<GameRecord>>>>,
}

impl ScriptedSource {
    fn new(cycles: Vec<scorewatch::error::Result<Vec<GameRecord>>>) -> Self {
        Self {
            cycles: Mutex::new(cycles.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ScoreSource for ScriptedSource {
    async fn games_for_date(&self, _date: NaiveDate) -> scorewatch::error::Result<Vec<GameRecord>> {
        self.cycles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn watch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
}

fn game(status: &str, home_points: Option<u32>, away_points: Option<u32>) -> GameRecord {
    GameRecord {
        id: "sr:game:1".to_string(),
        status: Some(status.to_string()),
        home_label: "Denver Nuggets".to_string(),
        away_label: "Los Angeles Lakers".to_string(),
        home_points,
        away_points,
        watch_date: watch_date(),
    }
}

fn t(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 5, 22, 0, 0).unwrap() + Duration::seconds(offset_secs)
}

fn tl(offset_secs: i64) -> DateTime<Local> {
    t(offset_secs).with_timezone(&Local)
}

fn driver_in(
    dir: &tempfile::TempDir,
    source: ScriptedSource,
) -> PollDriver {
    let store = GameStateStore::new(dir.path().join("game_state.json"));
    let events = EventLog::new(dir.path().join("events.jsonl"));
    PollDriver::new(
        Box::new(source),
        FinalityVerifier::from_secs(120),
        store,
        events,
        Some(watch_date()),
    )
}

async fn read_events(dir: &tempfile::TempDir) -> Vec<EventLogEntry> {
    let content = tokio::fs::read_to_string(dir.path().join("events.jsonl"))
        .await
        .expect("event log should exist");
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("every event line should parse"))
        .collect()
}

/// The canonical lifecycle: in progress, final, quiet cycle, verified.
#[tokio::test]
async fn finality_flow_across_four_cycles() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = ScriptedSource::new(vec![
        Ok(vec![game("inprogress", Some(55), Some(60))]),
        Ok(vec![game("final", Some(112), Some(104))]),
        Ok(vec![game("final", Some(112), Some(104))]),
        Ok(vec![game("final", Some(112), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);

    let report = driver.run_cycle(t(0), tl(0)).await;
    assert_eq!(report.finalized, 0, "in-progress game must not finalize");
    assert!(!driver.store().finalized("sr:game:1"));

    let report = driver.run_cycle(t(60), tl(60)).await;
    assert_eq!(report.finalized, 1, "in-progress to final opens the window");
    assert!(driver.store().finalized("sr:game:1"));

    // Window not yet elapsed: nothing happens
    let report = driver.run_cycle(t(120), tl(120)).await;
    assert_eq!(report.finalized, 0);
    assert_eq!(report.corrected, 0);
    assert_eq!(report.verified, 0);

    // 120s of quiet since the window opened: verified
    let report = driver.run_cycle(t(180), tl(180)).await;
    assert_eq!(report.verified, 1, "quiet window must close as verified");
    match driver.store().phase("sr:game:1") {
        GamePhase::Verified { outcome } => {
            let o = outcome.expect("scores were present");
            assert_eq!(o.winner, "Denver Nuggets");
            assert_eq!(o.summary(), "Denver Nuggets 112 - Los Angeles Lakers 104");
        }
        other => panic!("expected verified phase, got {:?}", other),
    }

    let events = read_events(&dir).await;
    assert_eq!(events.len(), 2, "exactly one final and one verified event");
    assert!(matches!(events[0].kind, EventKind::Final { .. }));
    assert!(matches!(events[1].kind, EventKind::Verified { .. }));
    assert_eq!(events[0].game_id, "sr:game:1");

    Ok(())
}

/// A restart mid-window resumes the saved baseline and deadline instead of
/// re-announcing the finalization.
#[tokio::test]
async fn restart_mid_window_resumes_saved_deadline() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let source = ScriptedSource::new(vec![
        Ok(vec![game("inprogress", Some(55), Some(60))]),
        Ok(vec![game("final", Some(112), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);
    driver.run_cycle(t(0), tl(0)).await;
    let report = driver.run_cycle(t(60), tl(60)).await;
    assert_eq!(report.finalized, 1);
    let saved_phase = driver.store().phase("sr:game:1");
    drop(driver);

    // New process: same files, fresh driver
    let source = ScriptedSource::new(vec![
        Ok(vec![game("final", Some(112), Some(104))]),
        Ok(vec![game("final", Some(112), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);
    driver.restore().await?;

    assert!(
        driver.store().finalized("sr:game:1"),
        "finalization must survive the restart"
    );
    assert_eq!(
        driver.store().phase("sr:game:1"),
        saved_phase,
        "window start and baseline must be the saved ones"
    );

    // Still inside the window: no duplicate finalization event
    let report = driver.run_cycle(t(120), tl(120)).await;
    assert_eq!(report.finalized, 0, "must not re-announce after restart");
    assert_eq!(report.corrected, 0);

    // Deadline measured from the original window start
    let report = driver.run_cycle(t(180), tl(180)).await;
    assert_eq!(report.verified, 1);

    let events = read_events(&dir).await;
    let finals = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Final { .. }))
        .count();
    assert_eq!(finals, 1, "the final event must appear exactly once");

    Ok(())
}

/// Once verified, a game stays settled across restarts and later feeds.
#[tokio::test]
async fn verified_game_survives_restart_silently() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let source = ScriptedSource::new(vec![Ok(vec![game("final", Some(112), Some(104))])]);
    let mut driver = driver_in(&dir, source);
    driver.run_cycle(t(0), tl(0)).await;
    let report = driver.run_cycle(t(120), tl(120)).await;
    assert_eq!(report.verified, 1);
    drop(driver);

    let source = ScriptedSource::new(vec![Ok(vec![game("final", Some(120), Some(104))])]);
    let mut driver = driver_in(&dir, source);
    driver.restore().await?;

    let report = driver.run_cycle(t(300), tl(300)).await;
    assert_eq!(report.finalized, 0);
    assert_eq!(report.corrected, 0, "verified games ignore later feed changes");
    assert_eq!(report.verified, 0);

    Ok(())
}

/// A fetch failure is absorbed: the cycle reports it, holds the due window
/// open, and the first successful fetch afterwards closes it.
#[tokio::test]
async fn fetch_failure_does_not_stall_verification() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = ScriptedSource::new(vec![
        Ok(vec![game("inprogress", Some(55), Some(60))]),
        Ok(vec![game("final", Some(112), Some(104))]),
        Err(ScorewatchError::Internal("connection reset".to_string())),
        Ok(vec![game("final", Some(112), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);

    driver.run_cycle(t(0), tl(0)).await;
    driver.run_cycle(t(60), tl(60)).await;

    // The window is due, but its date could not be fetched: held open
    let report = driver.run_cycle(t(300), tl(300)).await;
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.verified, 0, "window must not close during an outage");
    assert!(matches!(
        driver.store().phase("sr:game:1"),
        GamePhase::Watching { .. }
    ));

    let report = driver.run_cycle(t(360), tl(360)).await;
    assert_eq!(
        report.verified, 1,
        "verification resumes once the fetch recovers"
    );

    Ok(())
}

/// A correction that lands right after an outage still replaces the outcome;
/// a window never closes on a cycle whose fetch for its date failed.
#[tokio::test]
async fn correction_after_outage_replaces_outcome() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = ScriptedSource::new(vec![
        Ok(vec![game("final", Some(112), Some(104))]),
        Err(ScorewatchError::Internal("connection reset".to_string())),
        Ok(vec![game("final", Some(114), Some(104))]),
        Ok(vec![game("final", Some(114), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);

    let report = driver.run_cycle(t(0), tl(0)).await;
    assert_eq!(report.finalized, 1);

    // Past the deadline, but the feed is down
    let report = driver.run_cycle(t(180), tl(180)).await;
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.verified, 0);

    // The feed returns with an amended score: a correction, not a stale verify
    let report = driver.run_cycle(t(240), tl(240)).await;
    assert_eq!(report.corrected, 1, "the amendment must land as a correction");
    assert_eq!(report.verified, 0);

    // Quiet period from the correction runs out: settled on the amended score
    let report = driver.run_cycle(t(360), tl(360)).await;
    assert_eq!(report.verified, 1);
    match driver.store().phase("sr:game:1") {
        GamePhase::Verified { outcome } => {
            assert_eq!(outcome.expect("scores were present").home_points, 114);
        }
        other => panic!("expected verified phase, got {:?}", other),
    }

    Ok(())
}

/// A correction restarts the window; verification waits out the full quiet
/// period from the correction, not from the original finalization.
#[tokio::test]
async fn correction_pushes_verification_deadline() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = ScriptedSource::new(vec![
        Ok(vec![game("final", Some(112), Some(104))]),
        Ok(vec![game("final", Some(114), Some(104))]),
        Ok(vec![game("final", Some(114), Some(104))]),
        Ok(vec![game("final", Some(114), Some(104))]),
    ]);
    let mut driver = driver_in(&dir, source);

    let report = driver.run_cycle(t(0), tl(0)).await;
    assert_eq!(report.finalized, 1);

    let report = driver.run_cycle(t(60), tl(60)).await;
    assert_eq!(report.corrected, 1, "amended score must count as a correction");

    // 119s after the correction: still open
    let report = driver.run_cycle(t(179), tl(179)).await;
    assert_eq!(report.verified, 0, "window must restart from the correction");

    let report = driver.run_cycle(t(180), tl(180)).await;
    assert_eq!(report.verified, 1);
    match driver.store().phase("sr:game:1") {
        GamePhase::Verified { outcome } => {
            assert_eq!(
                outcome.expect("corrected scores were present").home_points,
                114,
                "verified outcome must be the corrected one"
            );
        }
        other => panic!("expected verified phase, got {:?}", other),
    }

    let events = read_events(&dir).await;
    assert_eq!(events.len(), 3, "final, correction, verified");
    assert!(matches!(events[1].kind, EventKind::Correction { .. }));

    Ok(())
}
