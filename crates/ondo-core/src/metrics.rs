//! Prometheus metrics helpers for ondo.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ondo_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     metrics::counter!("ondo_submissions_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `ondo_`, then the component (`submissions_`, `reputation_`, `sweep_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only `reason` on rejected submissions

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if a recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Serve `/metrics` on the given port from a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

fn register_metrics() {
    describe_gauge!(
        "ondo_engine_running",
        "Whether the engine daemon is running (1=yes, 0=no)"
    );

    // =========================================================================
    // Submissions
    // =========================================================================

    describe_counter!(
        "ondo_submissions_total",
        "Score submissions accepted and committed"
    );
    describe_counter!(
        "ondo_submissions_rejected_total",
        "Score submissions rejected (label: reason)"
    );

    // =========================================================================
    // Reputation
    // =========================================================================

    describe_counter!(
        "ondo_reputation_updates_total",
        "Reputation temperature updates applied"
    );
    describe_counter!(
        "ondo_reputation_update_conflicts_total",
        "Reputation compare-and-swap conflicts that triggered a retry"
    );

    // =========================================================================
    // Auto-fill sweep
    // =========================================================================

    describe_counter!("ondo_sweep_runs_total", "Auto-fill sweeps started");
    describe_counter!(
        "ondo_sweep_skipped_total",
        "Sweep triggers skipped because a sweep was already running"
    );
    describe_counter!(
        "ondo_sweep_rounds_closed_total",
        "Expired rounds reconciled and closed"
    );
    describe_counter!(
        "ondo_sweep_rounds_failed_total",
        "Expired rounds whose reconciliation failed"
    );
    describe_counter!(
        "ondo_sweep_scores_filled_total",
        "Neutral score rows inserted by the sweep"
    );
    describe_gauge!(
        "ondo_sweep_running",
        "Whether a sweep is currently running (1=yes, 0=no)"
    );
    describe_histogram!(
        "ondo_sweep_duration_seconds",
        "Wall-clock duration of one sweep"
    );
}
