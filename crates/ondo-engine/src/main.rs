//! Ondo evaluation engine daemon.
//!
//! Opens the evaluation database and keeps expired rounds reconciled: one
//! auto-fill sweep at startup, then one per day at a fixed UTC time.
//!
//! # Usage
//!
//! ```bash
//! # Run with settings from the environment (and ./.env if present)
//! ondo-engine
//!
//! # Override paths and the sweep time
//! ondo-engine \
//!     --db /var/lib/ondo/ondo.db \
//!     --membership-db /var/lib/platform/teams.db \
//!     --sweep-at 04:30
//! ```
//!
//! # Graceful Shutdown
//!
//! On Ctrl+C the scheduler stops waiting for the next run. A sweep already
//! in progress finishes its current round transaction before the process
//! exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::Parser;
use metrics::gauge;
use ondo_core::metrics::{init_metrics, start_metrics_server};
use ondo_engine::{Engine, EngineConfig, EvaluatorScope, SweepScheduler};
use tracing_subscriber::EnvFilter;

/// Ondo evaluation engine daemon.
#[derive(Parser, Debug)]
#[command(name = "ondo-engine")]
#[command(about = "Evaluation round auto-fill and reputation daemon")]
#[command(version)]
struct Args {
    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: PathBuf,

    /// Evaluation database (overrides ONDO_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Database with the team_member table (overrides ONDO_MEMBERSHIP_DB_PATH)
    #[arg(long)]
    membership_db: Option<PathBuf>,

    /// Daily sweep time as HH:MM UTC (overrides ONDO_SWEEP_AT)
    #[arg(long, value_parser = parse_sweep_time)]
    sweep_at: Option<NaiveTime>,

    /// Skip the sweep at startup
    #[arg(long)]
    no_startup_sweep: bool,

    /// Evaluator counting scope: lifetime or round (overrides ONDO_EVALUATOR_SCOPE)
    #[arg(long)]
    scope: Option<EvaluatorScope>,

    /// Metrics HTTP server port, 0 to disable (overrides ONDO_METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn parse_sweep_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.dotenv.exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv.display()))?;
        eprintln!("Loaded environment from {}", args.dotenv.display());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ondo_engine=debug")),
        )
        .init();

    tracing::info!("Ondo evaluation engine starting...");

    let config = apply_overrides(EngineConfig::from_env()?, &args);

    if config.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(config.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
        gauge!("ondo_engine_running").set(1.0);
    }

    let engine = Engine::open(&config)
        .with_context(|| format!("Failed to open engine at {}", config.db_path.display()))?;
    tracing::info!(
        items = engine.catalog().len(),
        scope = %config.evaluator_scope,
        "Engine ready"
    );

    let scheduler = SweepScheduler::new(Arc::new(engine), config.schedule());
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received, stopping gracefully...");
        })
        .await;

    gauge!("ondo_engine_running").set(0.0);
    tracing::info!("Ondo evaluation engine stopped");
    Ok(())
}

fn apply_overrides(mut config: EngineConfig, args: &Args) -> EngineConfig {
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    if let Some(membership_db) = &args.membership_db {
        config.membership_db_path = Some(membership_db.clone());
    }
    if let Some(sweep_at) = args.sweep_at {
        config.sweep_at = sweep_at;
    }
    if args.no_startup_sweep {
        config.sweep_on_startup = false;
    }
    if let Some(scope) = args.scope {
        config.evaluator_scope = scope;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    config
}
