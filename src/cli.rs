use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Duration;

use crate::adapters::{RosterSource, TeamsDocument};
use crate::error::{Result, ScorewatchError};

#[derive(Parser)]
#[command(name = "scorewatch")]
#[command(version = "0.1.0")]
#[command(about = "Game finality watcher with score verification", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(
        short,
        long,
        global = true,
        default_value = "config/default.toml",
        env = "SCOREWATCH_CONFIG"
    )]
    pub config: String,

    /// Watch a single date (YYYY-MM-DD) instead of the rolling window
    #[arg(short, long, global = true)]
    pub date: Option<NaiveDate>,

    /// Poll period in seconds (overrides config)
    #[arg(short, long, global = true)]
    pub period: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the finality watcher
    Run,
    /// List teams from a local team directory file
    Teams {
        /// Path to the teams JSON document
        #[arg(short, long, default_value = "data/teams.json")]
        teams: String,
    },
    /// Fetch full rosters for every team in the directory
    Roster {
        /// Path to the teams JSON document
        #[arg(short, long, default_value = "data/teams.json")]
        teams: String,
        /// Output directory for roster files
        #[arg(short, long, default_value = "output")]
        out: String,
    },
}

/// Print the team directory
pub async fn list_teams(teams_path: &str) -> Result<()> {
    let doc = read_teams(teams_path).await?;

    println!("\x1b[36m╔═══════════════════════════════════════════════════╗\x1b[0m");
    println!("\x1b[36m║                  TEAM DIRECTORY                     ║\x1b[0m");
    println!("\x1b[36m╚═══════════════════════════════════════════════════╝\x1b[0m\n");

    if doc.teams.is_empty() {
        println!("  No teams found in {}", teams_path);
        return Ok(());
    }

    println!("  Found {} teams:\n", doc.teams.len());
    for (i, team) in doc.teams.iter().enumerate() {
        println!(
            "  {:>2}. {:<5} {}",
            i + 1,
            team.alias.as_deref().unwrap_or("?"),
            team.display_name()
        );
        if let Some(id) = &team.id {
            println!("       ID: {}", id);
        }
    }

    println!();
    Ok(())
}

/// Fetch every team's roster, one file per team plus a combined document.
/// Per-team failures, fetch or write alike, are collected and reported at
/// the end; one bad team never aborts the sweep.
pub async fn collect_rosters(
    source: &dyn RosterSource,
    teams_path: &str,
    out_dir: &str,
) -> Result<()> {
    let doc = read_teams(teams_path).await?;
    if doc.teams.is_empty() {
        return Err(ScorewatchError::InvalidConfig(format!(
            "no teams found in {}",
            teams_path
        )));
    }
    println!("Collecting rosters for {} teams...\n", doc.teams.len());

    let roster_dir = Path::new(out_dir).join("rosters");
    tokio::fs::create_dir_all(&roster_dir).await?;

    let mut rosters = Vec::new();
    let mut errors = Vec::new();

    for (i, team) in doc.teams.iter().enumerate() {
        let Some(id) = team.id.as_deref() else {
            errors.push(format!("{}: missing team id", team.display_name()));
            continue;
        };

        match source.full_roster(id).await {
            Ok(mut roster) => {
                if let Some(obj) = roster.as_object_mut() {
                    obj.insert("_team_meta".to_string(), serde_json::to_value(team)?);
                }
                let alias = team.alias.as_deref().unwrap_or("team");
                let path = roster_dir.join(format!("{}_{}.json", alias, id));
                match tokio::fs::write(&path, serde_json::to_string_pretty(&roster)?).await {
                    Ok(()) => rosters.push(roster),
                    Err(e) => {
                        println!(
                            "  \x1b[31mFAILED\x1b[0m {} (write: {})",
                            team.display_name(),
                            e
                        );
                        errors.push(format!("{}: write failed: {}", team.display_name(), e));
                    }
                }
            }
            Err(e) => {
                println!("  \x1b[31mFAILED\x1b[0m {} ({})", team.display_name(), e);
                errors.push(format!("{}: {}", team.display_name(), e));
            }
        }

        if (i + 1) % 10 == 0 {
            println!("  ... {}/{} teams done", i + 1, doc.teams.len());
        }

        // Stay under the per-second request limit
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    let combined = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "count": rosters.len(),
        "errors": errors,
        "rosters": rosters,
    });
    let combined_path = Path::new(out_dir).join("all_team_rosters.json");
    tokio::fs::write(&combined_path, serde_json::to_string_pretty(&combined)?).await?;

    println!(
        "\n\x1b[32m✓\x1b[0m Done. Success: {}. Errors: {}.",
        rosters.len(),
        errors.len()
    );
    println!("  Roster files:  {}", roster_dir.display());
    println!("  Combined file: {}", combined_path.display());
    Ok(())
}

async fn read_teams(path: &str) -> Result<TeamsDocument> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
