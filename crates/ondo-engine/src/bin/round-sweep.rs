//! One-shot auto-fill sweep.
//!
//! Reconciles every expired open round once and exits. Useful for backfills
//! and for running the sweep from an external scheduler instead of the
//! daemon.
//!
//! # Usage
//!
//! ```bash
//! # List the rounds a sweep would close, without reconciling them
//! round-sweep --db ./data/ondo.db --dry-run
//!
//! # Sweep as of a fixed instant and print the report as JSON
//! round-sweep --db ./data/ondo.db --now 1718000000 --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ondo_engine::{Engine, EngineConfig, EvaluatorScope};
use tracing_subscriber::EnvFilter;

/// One-shot auto-fill sweep over expired evaluation rounds.
#[derive(Parser, Debug)]
#[command(name = "round-sweep")]
#[command(about = "Auto-fill and close every expired evaluation round once")]
#[command(version)]
struct Args {
    /// Path to the evaluation SQLite database
    #[arg(long, short, env = "ONDO_DB_PATH", default_value = "./data/ondo.db")]
    db: PathBuf,

    /// Database with the team_member table (defaults to --db)
    #[arg(long, env = "ONDO_MEMBERSHIP_DB_PATH")]
    membership_db: Option<PathBuf>,

    /// Sweep as of this Unix timestamp instead of the current time
    #[arg(long)]
    now: Option<i64>,

    /// Evaluator counting scope: lifetime or round
    #[arg(long, env = "ONDO_EVALUATOR_SCOPE", default_value = "lifetime")]
    scope: EvaluatorScope,

    /// Dry run - list expired rounds without reconciling them
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if !args.db.exists() {
        anyhow::bail!("Database file not found: {}", args.db.display());
    }

    let config = EngineConfig {
        db_path: args.db.clone(),
        membership_db_path: args.membership_db.clone(),
        evaluator_scope: args.scope,
        ..EngineConfig::default()
    };

    let engine = Engine::open(&config)
        .with_context(|| format!("Failed to open engine at {}", args.db.display()))?;
    let now = args.now.unwrap_or_else(Engine::unix_now);

    if args.dry_run {
        let rounds = engine.expired_rounds(now)?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&rounds)?);
            return Ok(());
        }

        println!("Expired open rounds as of {}: {}", now, rounds.len());
        for round in &rounds {
            println!(
                "  round {:>6}  team {:>6}  closed at {}",
                round.id, round.team_id, round.closes_at
            );
        }
        return Ok(());
    }

    let report = engine
        .close_expired_rounds(now)
        .context("Sweep failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Round Sweep");
        println!("===========");
        println!("Database:           {}", args.db.display());
        println!("As of:              {}", now);
        println!("Rounds examined:    {}", report.rounds_examined);
        println!("Rounds closed:      {}", report.rounds_closed);
        println!("Rounds failed:      {}", report.rounds_failed);
        println!("Rounds skipped:     {}", report.rounds_skipped);
        println!("Scores filled:      {}", report.scores_filled);
        println!("Reputation updates: {}", report.reputation_updates);
    }

    if report.rounds_failed > 0 {
        anyhow::bail!("{} round(s) failed to reconcile", report.rounds_failed);
    }

    Ok(())
}
