use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API credential, also read from the plain SPORTRADAR_API_KEY env var
    #[serde(default)]
    pub key: Option<String>,
    /// Base URL of the scores API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum fetch attempts before surfacing a failure
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,
    /// Ceiling for the backoff delay
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Length of the post-final re-confirmation window in seconds
    #[serde(default = "default_verification_secs")]
    pub verification_secs: u64,
    /// Watch exactly this date instead of the today/yesterday rule
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Durable snapshot of per-game tracked state
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Append-only JSONL event log
    #[serde(default = "default_event_log_path")]
    pub event_log_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log filter directives (RUST_LOG wins when set)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_base_url() -> String {
    "https://api.sportradar.com/nba/trial/v8/en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_period_secs() -> u64 {
    60
}

fn default_verification_secs() -> u64 {
    120
}

fn default_state_path() -> String {
    "data/game_state.json".to_string()
}

fn default_event_log_path() -> String {
    "data/events.jsonl".to_string()
}

fn default_log_level() -> String {
    "info,scorewatch=debug".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            verification_secs: default_verification_secs(),
            date: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            event_log_path: default_event_log_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file, layered with environment overrides
    pub fn load_from<P: AsRef<Path>>(config_file: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info,scorewatch=debug")?
            .set_default("logging.json", false)?
            // Load the config file when present
            .add_source(File::from(config_file.as_ref()).required(false))
            // Override with environment variables (SCOREWATCH__POLL__PERIOD_SECS, etc.)
            .add_source(
                Environment::with_prefix("SCOREWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;

        // The plain env var is the contract the surrounding tooling already uses;
        // it fills the key only when the layered sources left it unset.
        if cfg.api.key.is_none() {
            cfg.api.key = std::env::var("SPORTRADAR_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match &self.api.key {
            Some(key) if !key.trim().is_empty() => {}
            _ => errors.push(
                "API key is not set (use SPORTRADAR_API_KEY or SCOREWATCH__API__KEY)".to_string(),
            ),
        }

        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be positive".to_string());
        }

        if self.api.max_attempts == 0 {
            errors.push("api.max_attempts must be positive".to_string());
        }

        if self.poll.period_secs == 0 {
            errors.push("poll.period_secs must be positive".to_string());
        }

        if self.poll.verification_secs == 0 {
            errors.push("poll.verification_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
