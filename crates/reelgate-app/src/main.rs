//! Reelgate - moderation for media acquisition requests.
//!
//! Command-line front end:
//! - `decide`: run the engine on one request and print the decision
//! - `reviews` / `resolve`: work the staff review queue
//! - `learn` / `patterns`: drive and inspect the learning loop
//! - `requesters`: per-requester verdict statistics

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reelgate_app::config::AppConfig;
use reelgate_app::wiring::{build_engine, feedback_recorder, open_database};
use reelgate_core::{Decision, ModerationRequest};
use reelgate_storage::Database;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Reelgate - approve, reject or escalate media requests
#[derive(Parser, Debug)]
#[command(name = "reelgate", version, about)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide one request read from a JSON file
    Decide {
        /// Path to a JSON-encoded request
        #[arg(long)]
        request: PathBuf,
    },

    /// List open reviews
    Reviews {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Resolve an open review with a staff verdict
    Resolve {
        /// Review ID
        id: i64,

        /// Approve the request
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        /// Reject the request
        #[arg(long)]
        reject: bool,

        /// Why staff decided this way
        #[arg(long, default_value = "")]
        reason: String,

        /// Staff member resolving the review
        #[arg(long)]
        staff: Option<String>,
    },

    /// Fold pending feedback into learned patterns now
    Learn,

    /// List learned patterns
    Patterns,

    /// Show per-requester verdict statistics
    Requesters {
        /// Show a single requester
        id: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Initialize logging. Logs go to stderr so stdout stays machine-readable.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reelgate={},warn", args.log_level)));

    if let Some(log_dir) = &args.log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("reelgate")
                .filename_suffix("log")
                .build(log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        tracing::warn!("File logging unavailable, using console only");
        return None;
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

fn read_request(path: &Path) -> anyhow::Result<ModerationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid request in {}", path.display()))
}

async fn decide(config: &AppConfig, db: Arc<Database>, path: &Path) -> anyhow::Result<()> {
    let request = read_request(path)?;
    let engine = build_engine(config, db)?;
    let decision = engine.decide(&request).await?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn list_reviews(db: &Database, limit: i64) -> anyhow::Result<()> {
    let reviews = db.list_open_reviews(limit)?;
    if reviews.is_empty() {
        println!("No open reviews");
        return Ok(());
    }
    for review in reviews {
        println!(
            "#{}  {}  \"{}\"  confidence {:.2}  [{}]  {}",
            review.id,
            review.request_id,
            review.title,
            review.confidence,
            review.path,
            review.reason
        );
    }
    Ok(())
}

fn list_patterns(db: &Database) -> anyhow::Result<()> {
    let patterns = db.list_patterns()?;
    if patterns.is_empty() {
        println!("No learned patterns yet");
        return Ok(());
    }
    for pattern in patterns {
        println!(
            "{}={}  {}  occurrences {}  confidence {:.2}",
            pattern.kind.as_str(),
            pattern.value,
            pattern.decision,
            pattern.occurrences,
            pattern.confidence()
        );
    }
    Ok(())
}

fn list_requesters(db: &Database, id: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let stats = match id {
        Some(id) => db.requester_stats(id)?.into_iter().collect(),
        None => db.top_requesters(limit)?,
    };
    if stats.is_empty() {
        println!("No requester statistics");
        return Ok(());
    }
    for s in stats {
        let rate = s
            .approval_rate()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} ({})  total {}  approved {}  rejected {}  approval {}",
            s.requester_id, s.display_name, s.total_requests, s.approved_count, s.rejected_count, rate
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args);

    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let db = Arc::new(open_database(&config).context("failed to open database")?);

    match args.command {
        Command::Decide { request } => decide(&config, db, &request).await?,
        Command::Reviews { limit } => list_reviews(&db, limit)?,
        Command::Resolve {
            id,
            approve,
            reject: _,
            reason,
            staff,
        } => {
            let decision = if approve {
                Decision::Approved
            } else {
                Decision::Rejected
            };
            let recorder = feedback_recorder(&config, db.clone());
            let outcome = db.resolve_review(id, decision, &reason, staff.as_deref(), &recorder)?;
            println!("Review #{id} resolved as {decision} (feedback #{})", outcome.feedback_id);
            if let Some(report) = outcome.learned {
                println!(
                    "Learning pass: {} feedback records, {} pattern updates",
                    report.feedback_processed, report.patterns_updated
                );
            }
        }
        Command::Learn => {
            let report = feedback_recorder(&config, db.clone()).learn_now()?;
            println!(
                "Learning pass: {} feedback records, {} pattern updates",
                report.feedback_processed, report.patterns_updated
            );
        }
        Command::Patterns => list_patterns(&db)?,
        Command::Requesters { id, limit } => list_requesters(&db, id.as_deref(), limit)?,
    }

    Ok(())
}
