//! Single-flight scheduling of the auto-fill sweep.
//!
//! The sweep runs once at startup and then daily at a fixed UTC time. A
//! [`JobRegistry`] records which jobs are in flight; a trigger that finds the
//! sweep already running is skipped and logged, never queued.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;

use crate::closer::SweepReport;
use crate::engine::Engine;
use crate::{Error, Result};

/// Registry name of the auto-fill sweep.
pub const SWEEP_JOB: &str = "round-auto-fill";

/// Names of jobs currently executing.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    running: Arc<Mutex<HashSet<String>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as running, or `None` if it already is.
    pub fn try_acquire(&self, name: &str) -> Option<JobGuard> {
        if !self.running.lock().insert(name.to_string()) {
            return None;
        }
        Some(JobGuard {
            running: Arc::clone(&self.running),
            name: name.to_string(),
        })
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains(name)
    }
}

/// Releases the job's registry entry on drop.
#[derive(Debug)]
pub struct JobGuard {
    running: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.name);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Sweep once as soon as the scheduler starts.
    pub run_on_startup: bool,
    /// Daily sweep time (UTC).
    pub daily_at: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_on_startup: true,
            daily_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
        }
    }
}

/// What a trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed(SweepReport),
    /// Another sweep was in flight.
    Skipped,
}

/// Drives [`Engine::close_expired_rounds`] on a daily schedule.
#[derive(Clone)]
pub struct SweepScheduler {
    engine: Arc<Engine>,
    registry: JobRegistry,
    config: ScheduleConfig,
}

impl SweepScheduler {
    pub fn new(engine: Arc<Engine>, config: ScheduleConfig) -> Self {
        Self::with_registry(engine, JobRegistry::new(), config)
    }

    /// Share a registry with other schedulers or callers.
    pub fn with_registry(
        engine: Arc<Engine>,
        registry: JobRegistry,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one sweep now unless one is already in flight.
    ///
    /// The sweep runs on the blocking pool and holds the registry entry until
    /// it finishes, even if the returned future is dropped.
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        let Some(guard) = self.registry.try_acquire(SWEEP_JOB) else {
            counter!("ondo_sweep_skipped_total").increment(1);
            tracing::warn!(job = SWEEP_JOB, "sweep already running, trigger skipped");
            return Ok(TriggerOutcome::Skipped);
        };

        counter!("ondo_sweep_runs_total").increment(1);
        let engine = Arc::clone(&self.engine);

        let report = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            gauge!("ondo_sweep_running").set(1.0);
            let report = engine.close_expired_rounds(Engine::unix_now());
            gauge!("ondo_sweep_running").set(0.0);
            report
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))??;

        Ok(TriggerOutcome::Completed(report))
    }

    /// Run the schedule until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        if self.config.run_on_startup {
            self.run_logged().await;
        }

        loop {
            let now = Utc::now();
            let next = next_daily_run(now, self.config.daily_at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next_run = %next, "next auto-fill sweep scheduled");

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("sweep scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => self.run_logged().await,
            }
        }
    }

    async fn run_logged(&self) {
        match self.trigger().await {
            Ok(TriggerOutcome::Completed(report)) => {
                tracing::debug!(?report, "scheduled sweep completed");
            }
            Ok(TriggerOutcome::Skipped) => {}
            Err(e) => tracing::error!(error = %e, "scheduled sweep failed"),
        }
    }
}

/// The first instant strictly after `now` whose UTC wall-clock time is `at`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::engine_with_team;
    use ondo_core::RoundStatus;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_daily_run() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 1, 30, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(3, 0)),
            Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(3, 0)),
            Utc.with_ymd_and_hms(2024, 3, 11, 3, 0, 0).unwrap()
        );

        // Exactly at the scheduled time means the next day
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 3, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(now, at(3, 0)),
            Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_registry_single_flight() {
        let registry = JobRegistry::new();

        let guard = registry.try_acquire(SWEEP_JOB).unwrap();
        assert!(registry.is_running(SWEEP_JOB));
        assert!(registry.try_acquire(SWEEP_JOB).is_none());
        assert!(registry.try_acquire("other-job").is_some());

        drop(guard);
        assert!(!registry.is_running(SWEEP_JOB));
        assert!(registry.try_acquire(SWEEP_JOB).is_some());
    }

    #[tokio::test]
    async fn test_trigger_runs_sweep() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 1).unwrap();
        let engine = Arc::new(engine);

        let scheduler = SweepScheduler::new(Arc::clone(&engine), ScheduleConfig::default());
        let outcome = scheduler.trigger().await.unwrap();

        match outcome {
            TriggerOutcome::Completed(report) => assert_eq!(report.rounds_closed, 1),
            TriggerOutcome::Skipped => panic!("sweep should have run"),
        }
        assert_eq!(engine.round(round.id).unwrap().status, RoundStatus::Closed);
        assert!(!scheduler.registry().is_running(SWEEP_JOB));
    }

    #[tokio::test]
    async fn test_trigger_skipped_while_running() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 1).unwrap();
        let engine = Arc::new(engine);

        let registry = JobRegistry::new();
        let scheduler = SweepScheduler::with_registry(
            Arc::clone(&engine),
            registry.clone(),
            ScheduleConfig::default(),
        );

        let held = registry.try_acquire(SWEEP_JOB).unwrap();
        assert_eq!(scheduler.trigger().await.unwrap(), TriggerOutcome::Skipped);
        assert_eq!(engine.round(round.id).unwrap().status, RoundStatus::Open);

        drop(held);
        assert!(matches!(
            scheduler.trigger().await.unwrap(),
            TriggerOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_run_sweeps_on_startup_then_stops() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 1).unwrap();
        let engine = Arc::new(engine);

        let scheduler = SweepScheduler::new(Arc::clone(&engine), ScheduleConfig::default());
        scheduler.run(std::future::ready(())).await;

        assert_eq!(engine.round(round.id).unwrap().status, RoundStatus::Closed);
        assert_eq!(engine.score_count(round.id).unwrap(), 10);
    }

    #[tokio::test]
    async fn test_run_without_startup_sweep() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 1).unwrap();
        let engine = Arc::new(engine);

        let config = ScheduleConfig {
            run_on_startup: false,
            ..Default::default()
        };
        SweepScheduler::new(Arc::clone(&engine), config)
            .run(std::future::ready(()))
            .await;

        assert_eq!(engine.round(round.id).unwrap().status, RoundStatus::Open);
    }
}
