//! Reputation store and aggregator persistence.
//!
//! Each user has a single `reputation_state` row that both interactive
//! submissions and the auto-fill sweep read-modify-write.
//!
//! Callers run [`ReputationAggregator::apply_rating`] inside a
//! `BEGIN IMMEDIATE` transaction, which already serializes writers across
//! connections and processes. The compare-and-swap on the row's `version` is
//! a second guard: a swap that finds the row changed (or written by another
//! path on the same connection) is retried from a fresh read, up to
//! `max_attempts` times, and then fails with
//! [`Error::ConcurrencyExhausted`].

use metrics::counter;
use ondo_core::{DEFAULT_TEMPERATURE, ReputationState, UserId, next_temperature};
use rusqlite::{Connection, OptionalExtension};

use crate::{Error, Result};

/// Default number of compare-and-swap attempts per update.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A reputation row together with its concurrency token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VersionedState {
    pub state: ReputationState,
    pub version: i64,
}

pub(crate) fn load(conn: &Connection, user_id: UserId) -> Result<Option<VersionedState>> {
    let row = conn
        .query_row(
            "SELECT temperature, version, updated_at FROM reputation_state WHERE user_id = ?",
            [user_id],
            |row| {
                Ok(VersionedState {
                    state: ReputationState {
                        user_id,
                        temperature: row.get(0)?,
                        updated_at: Some(row.get(2)?),
                    },
                    version: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Current state, or the default state if the user was never rated.
pub(crate) fn get(conn: &Connection, user_id: UserId) -> Result<ReputationState> {
    Ok(load(conn, user_id)?
        .map(|row| row.state)
        .unwrap_or_else(|| ReputationState::initial(user_id)))
}

/// Write `temperature` if the row still has `expected_version`.
///
/// `None` means the caller saw no row; the insert then only succeeds if no
/// other writer created it in the meantime. Returns whether the write won.
pub(crate) fn compare_and_swap(
    conn: &Connection,
    user_id: UserId,
    expected_version: Option<i64>,
    temperature: f64,
    now: i64,
) -> Result<bool> {
    let changed = match expected_version {
        None => conn.execute(
            "INSERT INTO reputation_state (user_id, temperature, version, updated_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT(user_id) DO NOTHING",
            rusqlite::params![user_id, temperature, now],
        )?,
        Some(version) => conn.execute(
            "UPDATE reputation_state
             SET temperature = ?, version = version + 1, updated_at = ?
             WHERE user_id = ? AND version = ?",
            rusqlite::params![temperature, now, user_id, version],
        )?,
    };
    Ok(changed == 1)
}

/// Applies the damped update rule to a user's stored temperature.
#[derive(Debug, Clone, Copy)]
pub struct ReputationAggregator {
    max_attempts: u32,
}

impl Default for ReputationAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl ReputationAggregator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply one rating to `target` and return the new temperature.
    ///
    /// `prior_evaluators` is the number of distinct evaluators other than the
    /// current one who have rated the target.
    pub(crate) fn apply_rating(
        &self,
        conn: &Connection,
        target: UserId,
        mean_item_score: f64,
        prior_evaluators: u64,
        now: i64,
    ) -> Result<f64> {
        for attempt in 1..=self.max_attempts {
            let current = load(conn, target)?;
            let (temperature, version) = match &current {
                Some(row) => (row.state.temperature, Some(row.version)),
                None => (DEFAULT_TEMPERATURE, None),
            };

            let next = next_temperature(temperature, mean_item_score, prior_evaluators);

            if compare_and_swap(conn, target, version, next, now)? {
                counter!("ondo_reputation_updates_total").increment(1);
                tracing::debug!(
                    user_id = target,
                    from = temperature,
                    to = next,
                    evaluators = prior_evaluators + 1,
                    "reputation updated"
                );
                return Ok(next);
            }

            counter!("ondo_reputation_update_conflicts_total").increment(1);
            tracing::debug!(user_id = target, attempt, "reputation update conflict, retrying");
        }

        tracing::error!(
            user_id = target,
            attempts = self.max_attempts,
            "reputation update retries exhausted"
        );
        Err(Error::ConcurrencyExhausted {
            user_id: target,
            attempts: self.max_attempts,
        })
    }
}
