//! Wall-clock-aligned polling loop
//!
//! Ticks land on round multiples of the poll period (with a 60s period,
//! :00 of every minute) rather than drifting from whenever the process
//! happened to start. Cycles run inline on the tick so they never overlap;
//! a slow cycle just delays the next tick.

use chrono::{Local, Utc};
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::engine::cycle::PollDriver;
use crate::error::Result;

/// How long to wait so the next tick lands on a wall-clock multiple of
/// `period`. Zero when already on a boundary.
pub fn delay_until_next_boundary(now_millis: i64, period: Duration) -> Duration {
    let period_millis = period.as_millis() as i64;
    let rem = now_millis.rem_euclid(period_millis);
    Duration::from_millis(((period_millis - rem) % period_millis) as u64)
}

/// Poll until a shutdown signal arrives, then flush state and return.
pub async fn run(driver: &mut PollDriver, period: Duration) -> Result<()> {
    let delay = delay_until_next_boundary(Utc::now().timestamp_millis(), period);
    info!(
        "First poll in {}s (aligned to {}s boundaries)",
        delay.as_secs(),
        period.as_secs()
    );

    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                driver.run_cycle(Utc::now(), Local::now()).await;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, flushing state");
                driver.flush().await?;
                break;
            }
        }
    }

    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_alignment() {
        let minute = Duration::from_secs(60);

        // Already on a boundary: fire immediately
        assert_eq!(delay_until_next_boundary(0, minute), Duration::ZERO);
        assert_eq!(delay_until_next_boundary(60_000, minute), Duration::ZERO);

        // Just past a boundary: wait out the rest of the period
        assert_eq!(
            delay_until_next_boundary(1, minute),
            Duration::from_millis(59_999)
        );
        // Just before one: almost no wait
        assert_eq!(
            delay_until_next_boundary(59_999, minute),
            Duration::from_millis(1)
        );

        // Mid-minute real timestamp (2025-01-05T22:00:23.500Z)
        assert_eq!(
            delay_until_next_boundary(1_736_114_423_500, minute),
            Duration::from_millis(36_500)
        );
    }

    #[test]
    fn test_boundary_alignment_other_periods() {
        let fifteen = Duration::from_secs(15);
        assert_eq!(
            delay_until_next_boundary(7_000, fifteen),
            Duration::from_secs(8)
        );
        assert_eq!(delay_until_next_boundary(30_000, fifteen), Duration::ZERO);
    }
}
