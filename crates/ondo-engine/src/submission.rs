//! Score submission service.
//!
//! A submission is one evaluator's ratings of one target within one round.
//! Checks run fail-fast:
//!
//! 1. the round exists
//! 2. an open round past its deadline is closed (and stays closed)
//! 3. evaluator and target differ
//! 4. the round is open
//! 5. evaluator and target are current team members
//! 6. the evaluator has not rated this target in this round yet
//! 7. item scores are known, unique and in range (none supplied means a
//!    neutral value for every catalog item)
//!
//! The ledger rows and the target's reputation update commit together.

use std::collections::HashSet;

use metrics::counter;
use ondo_core::{EvaluationRound, ItemScore, RoundId, RoundStatus, UserId, mean_item_score};
use serde::{Deserialize, Serialize};

use crate::db::{rounds, scores};
use crate::engine::Engine;
use crate::{Error, Result};

/// One evaluator's ratings of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub round_id: RoundId,
    pub evaluator_user_id: UserId,
    pub target_user_id: UserId,
    /// Empty means "neutral on every item".
    #[serde(default)]
    pub item_scores: Vec<ItemScore>,
}

impl SubmissionRequest {
    pub fn new(
        round_id: RoundId,
        evaluator_user_id: UserId,
        target_user_id: UserId,
        item_scores: Vec<ItemScore>,
    ) -> Self {
        Self {
            round_id,
            evaluator_user_id,
            target_user_id,
            item_scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub round_id: RoundId,
    pub target_user_id: UserId,
    /// The target now counts as evaluated by this evaluator.
    pub evaluated: bool,
    /// The target's temperature after this submission.
    pub temperature: f64,
}

impl Engine {
    /// Submit scores at the current time.
    pub fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult> {
        self.submit_at(request, Self::unix_now())
    }

    /// Submit scores as of `now` (Unix seconds).
    pub fn submit_at(&self, request: &SubmissionRequest, now: i64) -> Result<SubmissionResult> {
        let result = self.try_submit(request, now);

        match &result {
            Ok(outcome) => {
                counter!("ondo_submissions_total").increment(1);
                tracing::debug!(
                    round_id = request.round_id,
                    evaluator = request.evaluator_user_id,
                    target = request.target_user_id,
                    temperature = outcome.temperature,
                    "submission accepted"
                );
            }
            Err(e) => {
                counter!("ondo_submissions_rejected_total", "reason" => e.reason()).increment(1);
                tracing::debug!(
                    round_id = request.round_id,
                    evaluator = request.evaluator_user_id,
                    target = request.target_user_id,
                    reason = e.reason(),
                    "submission rejected"
                );
            }
        }

        result
    }

    fn try_submit(&self, request: &SubmissionRequest, now: i64) -> Result<SubmissionResult> {
        let round = self.close_if_expired(request.round_id, now)?;

        let evaluator = request.evaluator_user_id;
        let target = request.target_user_id;

        if evaluator == target {
            return Err(Error::SelfEvaluationNotAllowed);
        }
        if round.status != RoundStatus::Open {
            return Err(Error::RoundClosed(round.id));
        }

        let members = self.members(round.team_id)?;
        if !members.contains_key(&evaluator) {
            return Err(Error::Forbidden {
                user_id: evaluator,
                team_id: round.team_id,
            });
        }
        if !members.contains_key(&target) {
            return Err(Error::TargetNotMember {
                user_id: target,
                team_id: round.team_id,
            });
        }

        self.db.write(|tx| {
            // The sweep or an administrator may have moved the round since
            // the checks above.
            let current = rounds::get(tx, round.id)?.ok_or(Error::RoundNotFound(round.id))?;
            if !current.accepts_submissions(now) {
                return Err(Error::RoundClosed(round.id));
            }

            if scores::has_submission(tx, round.id, evaluator, target)? {
                return Err(Error::AlreadySubmitted {
                    round_id: round.id,
                    evaluator,
                    target,
                });
            }

            let item_scores = self.resolve_item_scores(&request.item_scores)?;
            for score in &item_scores {
                scores::insert(tx, round.id, evaluator, target, score, now)?;
            }

            let values: Vec<i32> = item_scores.iter().map(|s| s.value).collect();
            let mean = mean_item_score(&values)
                .ok_or_else(|| Error::Config("evaluation item catalog is empty".to_string()))?;

            let prior = self.prior_evaluators(tx, target, evaluator, round.id)?;
            let temperature = self.aggregator.apply_rating(tx, target, mean, prior, now)?;

            Ok(SubmissionResult {
                round_id: round.id,
                target_user_id: target,
                evaluated: true,
                temperature,
            })
        })
    }

    /// Load a round, closing it first if it is open but past its deadline.
    ///
    /// The close commits on its own, whatever happens to the request that
    /// triggered it.
    pub(crate) fn close_if_expired(&self, round_id: RoundId, now: i64) -> Result<EvaluationRound> {
        let round = self.round(round_id)?;
        if round.status != RoundStatus::Open || !round.is_expired(now) {
            return Ok(round);
        }

        self.db.write(|tx| {
            let current = rounds::get(tx, round_id)?.ok_or(Error::RoundNotFound(round_id))?;
            if current.status != RoundStatus::Open {
                return Ok(current);
            }

            let closed = rounds::transition(tx, &current, RoundStatus::Closed)?;
            tracing::info!(
                round_id,
                team_id = closed.team_id,
                closes_at = closed.closes_at,
                "closed expired round on submission"
            );
            Ok(closed)
        })
    }

    /// Validate supplied scores against the catalog, or default to neutral
    /// scores for every item.
    fn resolve_item_scores(&self, supplied: &[ItemScore]) -> Result<Vec<ItemScore>> {
        if supplied.is_empty() {
            return Ok(self.catalog.neutral_scores());
        }

        let mut seen = HashSet::with_capacity(supplied.len());
        for score in supplied {
            let item = self
                .catalog
                .get(score.item_id)
                .ok_or(Error::UnknownItem(score.item_id))?;

            if !seen.insert(score.item_id) {
                return Err(Error::DuplicateItem(score.item_id));
            }

            if !item.accepts(score.value) {
                return Err(Error::ScoreOutOfRange {
                    item_id: item.id,
                    value: score.value,
                    min: item.scale_min,
                    max: item.scale_max,
                });
            }
        }

        Ok(supplied.to_vec())
    }
}
