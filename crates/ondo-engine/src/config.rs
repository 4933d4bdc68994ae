//! Engine configuration loaded from environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveTime;

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::engine::{EngineSettings, EvaluatorScope};
use crate::reputation::DEFAULT_MAX_ATTEMPTS;
use crate::scheduler::ScheduleConfig;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the evaluation SQLite database.
    pub db_path: PathBuf,

    /// Path to the database holding `team_member`; `None` reads it from
    /// `db_path`.
    pub membership_db_path: Option<PathBuf>,

    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,

    /// Which rounds count toward a target's distinct evaluators.
    pub evaluator_scope: EvaluatorScope,

    /// Compare-and-swap attempts per reputation update.
    pub max_update_attempts: u32,

    /// Daily sweep time (UTC).
    pub sweep_at: NaiveTime,

    /// Whether to sweep once at process start.
    pub sweep_on_startup: bool,

    /// Prometheus exporter port (0 disables it).
    pub metrics_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/ondo.db"),
            membership_db_path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            evaluator_scope: EvaluatorScope::default(),
            max_update_attempts: DEFAULT_MAX_ATTEMPTS,
            sweep_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
            sweep_on_startup: true,
            metrics_port: 9090,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `ONDO_DB_PATH`: Evaluation database (default: "./data/ondo.db")
    /// - `ONDO_MEMBERSHIP_DB_PATH`: Database with the `team_member` table (default: `ONDO_DB_PATH`)
    /// - `ONDO_BUSY_TIMEOUT_MS`: SQLite busy timeout (default: 5000)
    /// - `ONDO_EVALUATOR_SCOPE`: `lifetime` or `round` (default: "lifetime")
    /// - `ONDO_MAX_UPDATE_ATTEMPTS`: Reputation CAS attempts (default: 5)
    /// - `ONDO_SWEEP_AT`: Daily sweep time as `HH:MM` UTC (default: "03:00")
    /// - `ONDO_SWEEP_ON_STARTUP`: Sweep once at start (default: true)
    /// - `ONDO_METRICS_PORT`: Metrics port, 0 to disable (default: 9090)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let db_path = std::env::var("ONDO_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let membership_db_path = std::env::var("ONDO_MEMBERSHIP_DB_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let busy_timeout = Duration::from_millis(env_parse(
            "ONDO_BUSY_TIMEOUT_MS",
            defaults.busy_timeout.as_millis() as u64,
        )?);

        let evaluator_scope = env_parse("ONDO_EVALUATOR_SCOPE", defaults.evaluator_scope)?;

        let max_update_attempts =
            env_parse("ONDO_MAX_UPDATE_ATTEMPTS", defaults.max_update_attempts)?;
        if max_update_attempts == 0 {
            anyhow::bail!("ONDO_MAX_UPDATE_ATTEMPTS must be at least 1");
        }

        let sweep_at = match std::env::var("ONDO_SWEEP_AT") {
            Ok(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M")
                .with_context(|| format!("ONDO_SWEEP_AT must be HH:MM, got '{}'", value))?,
            Err(_) => defaults.sweep_at,
        };

        let sweep_on_startup = match std::env::var("ONDO_SWEEP_ON_STARTUP") {
            Ok(value) => parse_bool(&value)
                .with_context(|| format!("ONDO_SWEEP_ON_STARTUP is not a boolean: '{}'", value))?,
            Err(_) => defaults.sweep_on_startup,
        };

        let metrics_port = env_parse("ONDO_METRICS_PORT", defaults.metrics_port)?;

        tracing::info!(
            db_path = %db_path.display(),
            membership_db = ?membership_db_path,
            scope = %evaluator_scope,
            sweep_at = %sweep_at,
            sweep_on_startup,
            metrics_port,
            "engine configuration loaded"
        );

        Ok(Self {
            db_path,
            membership_db_path,
            busy_timeout,
            evaluator_scope,
            max_update_attempts,
            sweep_at,
            sweep_on_startup,
            metrics_port,
        })
    }

    /// Database that holds `team_member`.
    pub fn membership_path(&self) -> &Path {
        self.membership_db_path.as_deref().unwrap_or(&self.db_path)
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            evaluator_scope: self.evaluator_scope,
            max_update_attempts: self.max_update_attempts,
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            run_on_startup: self.sweep_on_startup,
            daily_at: self.sweep_at,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: '{}' ({})", key, value, e)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "ONDO_DB_PATH",
        "ONDO_MEMBERSHIP_DB_PATH",
        "ONDO_BUSY_TIMEOUT_MS",
        "ONDO_EVALUATOR_SCOPE",
        "ONDO_MAX_UPDATE_ATTEMPTS",
        "ONDO_SWEEP_AT",
        "ONDO_SWEEP_ON_STARTUP",
        "ONDO_METRICS_PORT",
    ];

    /// Run `f` with only `vars` set among the engine's env vars.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = EngineConfig::from_env().unwrap();
            assert_eq!(config.db_path, PathBuf::from("./data/ondo.db"));
            assert_eq!(config.membership_path(), Path::new("./data/ondo.db"));
            assert_eq!(config.busy_timeout, Duration::from_secs(5));
            assert_eq!(config.evaluator_scope, EvaluatorScope::Lifetime);
            assert_eq!(config.max_update_attempts, 5);
            assert_eq!(config.sweep_at, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
            assert!(config.sweep_on_startup);
            assert_eq!(config.metrics_port, 9090);
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("ONDO_DB_PATH", "/var/lib/ondo/ondo.db"),
                ("ONDO_MEMBERSHIP_DB_PATH", "/var/lib/platform/teams.db"),
                ("ONDO_BUSY_TIMEOUT_MS", "250"),
                ("ONDO_EVALUATOR_SCOPE", "round"),
                ("ONDO_MAX_UPDATE_ATTEMPTS", "9"),
                ("ONDO_SWEEP_AT", "23:45"),
                ("ONDO_SWEEP_ON_STARTUP", "no"),
                ("ONDO_METRICS_PORT", "0"),
            ],
            || {
                let config = EngineConfig::from_env().unwrap();
                assert_eq!(config.db_path, PathBuf::from("/var/lib/ondo/ondo.db"));
                assert_eq!(
                    config.membership_path(),
                    Path::new("/var/lib/platform/teams.db")
                );
                assert_eq!(config.busy_timeout, Duration::from_millis(250));
                assert_eq!(config.evaluator_scope, EvaluatorScope::Round);
                assert_eq!(config.settings().max_update_attempts, 9);
                assert_eq!(
                    config.schedule().daily_at,
                    NaiveTime::from_hms_opt(23, 45, 0).unwrap()
                );
                assert!(!config.schedule().run_on_startup);
                assert_eq!(config.metrics_port, 0);
            },
        );
    }

    #[test]
    fn config_rejects_bad_sweep_time() {
        with_env_vars(&[("ONDO_SWEEP_AT", "25:00")], || {
            assert!(EngineConfig::from_env().is_err());
        });
    }

    #[test]
    fn config_rejects_unknown_scope() {
        with_env_vars(&[("ONDO_EVALUATOR_SCOPE", "team")], || {
            assert!(EngineConfig::from_env().is_err());
        });
    }

    #[test]
    fn config_rejects_zero_attempts() {
        with_env_vars(&[("ONDO_MAX_UPDATE_ATTEMPTS", "0")], || {
            assert!(EngineConfig::from_env().is_err());
        });
    }

    #[test]
    fn config_empty_membership_path_falls_back() {
        with_env_vars(&[("ONDO_MEMBERSHIP_DB_PATH", "  ")], || {
            let config = EngineConfig::from_env().unwrap();
            assert!(config.membership_db_path.is_none());
        });
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
