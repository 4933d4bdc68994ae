//! Round auto-fill closer.
//!
//! Reconciles every open round whose deadline has passed: each ordered pair
//! of current members that never submitted gets a neutral score per catalog
//! item, the target's reputation moves toward the neutral rating, and the
//! round is closed. Each round is reconciled in a single write transaction,
//! so a failure leaves it open and untouched for the next sweep.

use std::collections::HashSet;
use std::time::Instant;

use metrics::{counter, histogram};
use ondo_core::{EvaluationRound, NEUTRAL_SCORE, RoundStatus, UserId};
use serde::{Deserialize, Serialize};

use crate::db::{rounds, scores};
use crate::engine::Engine;
use crate::Result;

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Expired open rounds found at the start of the sweep.
    pub rounds_examined: usize,
    pub rounds_closed: usize,
    /// Rounds left open because reconciliation failed.
    pub rounds_failed: usize,
    /// Rounds closed or canceled by someone else mid-sweep.
    pub rounds_skipped: usize,
    /// Neutral score rows inserted.
    pub scores_filled: u64,
    pub reputation_updates: u64,
}

#[derive(Debug, Default)]
struct RoundFill {
    scores: u64,
    updates: u64,
}

impl Engine {
    /// Open rounds whose deadline lies strictly before `now`.
    pub fn expired_rounds(&self, now: i64) -> Result<Vec<EvaluationRound>> {
        self.db.read(|conn| rounds::expired_open(conn, now))
    }

    /// Auto-fill and close every expired open round.
    ///
    /// A round that fails to reconcile is logged and counted; the sweep
    /// carries on with the next one.
    pub fn close_expired_rounds(&self, now: i64) -> Result<SweepReport> {
        let started = Instant::now();
        let expired = self.expired_rounds(now)?;

        let mut report = SweepReport {
            rounds_examined: expired.len(),
            ..Default::default()
        };

        for round in &expired {
            match self.reconcile_round(round, now) {
                Ok(Some(fill)) => {
                    report.rounds_closed += 1;
                    report.scores_filled += fill.scores;
                    report.reputation_updates += fill.updates;
                    tracing::info!(
                        round_id = round.id,
                        team_id = round.team_id,
                        scores_filled = fill.scores,
                        "expired round auto-filled and closed"
                    );
                }
                Ok(None) => {
                    report.rounds_skipped += 1;
                    tracing::debug!(round_id = round.id, "round no longer open, skipped");
                }
                Err(e) => {
                    report.rounds_failed += 1;
                    tracing::error!(
                        round_id = round.id,
                        team_id = round.team_id,
                        error = %e,
                        "failed to reconcile expired round"
                    );
                }
            }
        }

        counter!("ondo_sweep_rounds_closed_total").increment(report.rounds_closed as u64);
        counter!("ondo_sweep_rounds_failed_total").increment(report.rounds_failed as u64);
        counter!("ondo_sweep_scores_filled_total").increment(report.scores_filled);
        histogram!("ondo_sweep_duration_seconds").record(started.elapsed().as_secs_f64());

        tracing::info!(
            examined = report.rounds_examined,
            closed = report.rounds_closed,
            failed = report.rounds_failed,
            skipped = report.rounds_skipped,
            scores_filled = report.scores_filled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "auto-fill sweep finished"
        );

        Ok(report)
    }

    /// Fill and close one round. `None` if it stopped being open.
    fn reconcile_round(&self, round: &EvaluationRound, now: i64) -> Result<Option<RoundFill>> {
        // Outside the transaction: the provider may be slow or remote.
        let members: Vec<UserId> = self.members(round.team_id)?.into_keys().collect();

        let neutral = self.catalog.neutral_scores();
        let neutral_mean = f64::from(NEUTRAL_SCORE);
        let scope = self.settings.evaluator_scope.round_filter(round.id);

        self.db.write(|tx| {
            let Some(current) = rounds::get(tx, round.id)? else {
                return Ok(None);
            };
            if current.status != RoundStatus::Open {
                return Ok(None);
            }

            let mut fill = RoundFill::default();

            if members.is_empty() {
                rounds::transition(tx, &current, RoundStatus::Closed)?;
                return Ok(Some(fill));
            }

            let covered: HashSet<(UserId, UserId)> = scores::for_round(tx, round.id)?
                .into_iter()
                .map(|s| (s.evaluator_user_id, s.target_user_id))
                .collect();

            for &target in &members {
                // Loaded before any fill for this target and grown per pair,
                // so successive neutral ratings are progressively damped.
                let mut evaluators = scores::evaluators_of(tx, target, scope)?;

                for &evaluator in &members {
                    if evaluator == target || covered.contains(&(evaluator, target)) {
                        continue;
                    }

                    let mut inserted = 0;
                    for score in &neutral {
                        if scores::insert_if_absent(tx, round.id, evaluator, target, score, now)? {
                            inserted += 1;
                        }
                    }
                    if inserted == 0 {
                        continue;
                    }
                    fill.scores += inserted;

                    evaluators.insert(evaluator);
                    let prior = evaluators.len() as u64 - 1;
                    self.aggregator
                        .apply_rating(tx, target, neutral_mean, prior, now)?;
                    fill.updates += 1;
                }
            }

            rounds::transition(tx, &current, RoundStatus::Closed)?;
            Ok(Some(fill))
        })
    }
}
