//! Sportradar-style schedule client
//!
//! Fetches the day's games from a date-keyed schedule endpoint and normalizes
//! them into [`GameRecord`]s. Transient failures (connection errors, 5xx,
//! rate limits) are retried with capped exponential backoff before a fetch
//! error is surfaced to the caller.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::domain::GameRecord;
use crate::error::{Result, ScorewatchError};

use super::{RosterSource, ScoreSource};

// ── Retry policy ────────────────────────────────────────────────

/// Bounded retry schedule for feed requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before giving up (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff (default: 1s)
    pub base_backoff_secs: u64,
    /// Maximum backoff delay (default: 60s)
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_secs: 1,
            max_backoff_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_count` (0-based): base * 2^n, capped.
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let delay = self
            .base_backoff_secs
            .saturating_mul(2u64.saturating_pow(retry_count));
        Duration::from_secs(delay.min(self.max_backoff_secs))
    }

    /// Delay after a rate-limit response. The server's Retry-After wins when
    /// it asks for a longer wait than the backoff schedule.
    pub fn rate_limit_delay(&self, retry_count: u32, retry_after_secs: Option<u64>) -> Duration {
        let backoff = self.backoff_duration(retry_count);
        match retry_after_secs {
            Some(secs) => backoff.max(Duration::from_secs(secs)),
            None => backoff,
        }
    }
}

impl From<&ApiConfig> for RetryPolicy {
    fn from(cfg: &ApiConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_backoff_secs: cfg.base_backoff_secs,
            max_backoff_secs: cfg.max_backoff_secs,
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    games: Vec<ApiGame>,
}

#[derive(Debug, Deserialize)]
struct ApiGame {
    id: String,
    status: Option<String>,
    home_points: Option<u32>,
    away_points: Option<u32>,
    home: ApiTeam,
    away: ApiTeam,
}

#[derive(Debug, Default, Deserialize)]
struct ApiTeam {
    #[serde(default)]
    market: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    alias: Option<String>,
}

impl ApiTeam {
    /// Display label: "market name" when both parts exist, else whatever the
    /// feed provided, falling back to the alias.
    fn label(&self) -> String {
        match (&self.market, &self.name) {
            (Some(market), Some(name)) => format!("{} {}", market, name),
            (None, Some(name)) => name.clone(),
            (Some(market), None) => market.clone(),
            (None, None) => self.alias.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

impl ApiGame {
    fn into_record(self, watch_date: NaiveDate) -> GameRecord {
        GameRecord {
            id: self.id,
            status: self.status,
            home_label: self.home.label(),
            away_label: self.away.label(),
            home_points: self.home_points,
            away_points: self.away_points,
            watch_date,
        }
    }
}

// ── Teams document ──────────────────────────────────────────────

/// Local team directory document consumed by the one-shot commands
#[derive(Debug, Deserialize)]
pub struct TeamsDocument {
    #[serde(default)]
    pub teams: Vec<TeamEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TeamEntry {
    pub fn display_name(&self) -> String {
        match (&self.market, &self.name) {
            (Some(market), Some(name)) => format!("{} {}", market, name),
            (None, Some(name)) => name.clone(),
            (Some(market), None) => market.clone(),
            (None, None) => "unknown".to_string(),
        }
    }
}

// ── Client ──────────────────────────────────────────────────────

/// Scores API client with a bounded retry loop
pub struct SportradarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl SportradarClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        let key = cfg
            .key
            .as_deref()
            .ok_or_else(|| ScorewatchError::InvalidConfig("API key is not set".to_string()))?;
        Self::new(
            &cfg.base_url,
            key,
            Duration::from_secs(cfg.timeout_secs),
            RetryPolicy::from(cfg),
        )
    }

    fn schedule_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/games/{}/schedule.json",
            self.base_url,
            date.format("%Y/%m/%d")
        )
    }

    fn roster_url(&self, team_id: &str) -> String {
        format!("{}/teams/{}/full_roster.json", self.base_url, team_id)
    }

    /// Fetch and normalize the schedule for one calendar date
    pub async fn daily_schedule(&self, date: NaiveDate) -> Result<Vec<GameRecord>> {
        let url = self.schedule_url(date);
        let schedule: ScheduleResponse = self.get_json(&url).await?;
        let games: Vec<GameRecord> = schedule
            .games
            .into_iter()
            .map(|g| g.into_record(date))
            .collect();
        debug!("Fetched {} games for {}", games.len(), date);
        Ok(games)
    }

    /// GET with the bounded retry loop: 429 waits out the rate limit, 5xx and
    /// connection errors back off, any other non-success status fails fast.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut next_delay: Option<Duration> = None;
        let mut last_error: Option<ScorewatchError> = None;

        for attempt in 0..self.retry.max_attempts {
            if let Some(delay) = next_delay.take() {
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .http
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[("api_key", self.api_key.as_str())])
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let delay = self.retry.backoff_duration(attempt);
                    warn!(
                        "Request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    last_error = Some(ScorewatchError::Http(e));
                    next_delay = Some(delay);
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let delay = self.retry.rate_limit_delay(attempt, retry_after);
                warn!(
                    "Rate limited (attempt {}/{}), retrying in {:?}",
                    attempt + 1,
                    self.retry.max_attempts,
                    delay
                );
                last_error = Some(ScorewatchError::RateLimited(format!(
                    "{} (retry-after: {:?})",
                    url, retry_after
                )));
                next_delay = Some(delay);
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                let delay = self.retry.backoff_duration(attempt);
                warn!(
                    "Server error {} (attempt {}/{}), retrying in {:?}",
                    status,
                    attempt + 1,
                    self.retry.max_attempts,
                    delay
                );
                last_error = Some(ScorewatchError::Api {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                });
                next_delay = Some(delay);
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ScorewatchError::Api {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                });
            }

            return Ok(response.json::<T>().await?);
        }

        Err(ScorewatchError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}

#[async_trait]
impl ScoreSource for SportradarClient {
    async fn games_for_date(&self, date: NaiveDate) -> Result<Vec<GameRecord>> {
        self.daily_schedule(date).await
    }
}

#[async_trait]
impl RosterSource for SportradarClient {
    async fn full_roster(&self, team_id: &str) -> Result<serde_json::Value> {
        let url = self.roster_url(team_id);
        self.get_json(&url).await
    }
}

/// Keep error bodies log-friendly
fn truncate_body(body: &str) -> String {
    body.chars().take(500).collect()
}
