use clap::Parser;
use scorewatch::adapters::SportradarClient;
use scorewatch::cli::{self, Cli, Commands};
use scorewatch::config::{AppConfig, LoggingConfig};
use scorewatch::engine::{scheduler, FinalityVerifier, PollDriver};
use scorewatch::error::{Result, ScorewatchError};
use scorewatch::persistence::{EventLog, GameStateStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Teams { teams }) => {
            init_logging_simple();
            cli::list_teams(teams).await?;
        }
        Some(Commands::Roster { teams, out }) => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config)?;
            let client = SportradarClient::from_config(&config.api)?;
            cli::collect_rosters(&client, teams, out).await?;
        }
        Some(Commands::Run) | None => {
            let (config, load_err) = match AppConfig::load_from(&cli.config) {
                Ok(c) => (c, None),
                Err(e) => (AppConfig::default(), Some(e)),
            };
            init_logging(&config.logging);
            if let Some(e) = load_err {
                warn!(
                    "Failed to load configuration from {}: {}, using defaults",
                    cli.config, e
                );
            }
            run_watcher(&cli, config).await?;
        }
    }

    Ok(())
}

async fn run_watcher(cli: &Cli, mut config: AppConfig) -> Result<()> {
    info!("Starting game finality watcher (scorewatch)");

    // CLI flags win over the config file
    if let Some(date) = cli.date {
        config.poll.date = Some(date);
    }
    if let Some(period) = cli.period {
        config.poll.period_secs = period;
    }

    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("Config: {}", problem);
        }
        return Err(ScorewatchError::InvalidConfig(problems.join("; ")));
    }

    print_banner(&config);

    let client = SportradarClient::from_config(&config.api)?;
    let store = GameStateStore::new(PathBuf::from(&config.store.state_path));
    let events = EventLog::new(PathBuf::from(&config.store.event_log_path));
    let verifier = FinalityVerifier::from_secs(config.poll.verification_secs);

    let mut driver = PollDriver::new(
        Box::new(client),
        verifier,
        store,
        events,
        config.poll.date,
    );
    driver.restore().await?;

    let dates = match config.poll.date {
        Some(d) => format!("{} only", d),
        None => "today (plus yesterday before noon)".to_string(),
    };
    info!(
        "Watching {}, polling every {}s, {}s verification window",
        dates, config.poll.period_secs, config.poll.verification_secs
    );

    scheduler::run(&mut driver, Duration::from_secs(config.poll.period_secs)).await?;

    info!("Shutdown complete");
    Ok(())
}

fn print_banner(config: &AppConfig) {
    let key = config
        .api
        .key
        .as_deref()
        .map(mask_key)
        .unwrap_or_else(|| "unset".to_string());

    println!("\x1b[36m");
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            SCOREWATCH - Game Finality Watcher                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\x1b[0m");
    println!("  API:     {} (key: {})", config.api.base_url, key);
    println!("  Poll:    every {}s", config.poll.period_secs);
    println!("  Window:  {}s quiet before verified", config.poll.verification_secs);
    println!("  State:   {}", config.store.state_path);
    println!("  Events:  {}", config.store.event_log_path);
    println!();
}

fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

fn init_logging(cfg: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    // File logging is optional (prefer SCOREWATCH_LOG_DIR, fallback to LOG_DIR).
    let log_dir = std::env::var("SCOREWATCH_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .unwrap_or_else(|_| "logs".to_string());

    // `tracing_appender::rolling::daily` panics (and with panic=abort, kills
    // the process) if it cannot create the initial log file, so writability
    // is preflighted first.
    let file_layer = if std::fs::create_dir_all(&log_dir).is_ok() {
        let test_path = std::path::Path::new(&log_dir).join(".scorewatch_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(&log_dir, "scorewatch.log");
                let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(_guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    } else {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir
        );
        None
    };

    let console_layer = if cfg.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if file_logging_enabled {
        eprintln!("Logging to: {}/scorewatch.log", log_dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
