//! Round read model.

use std::collections::HashMap;

use ondo_core::{EvaluationItem, EvaluationRound, ItemId, RoundId, UserId};
use serde::{Deserialize, Serialize};

use crate::db::scores;
use crate::engine::Engine;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemScoreView {
    pub item_id: ItemId,
    pub item_code: String,
    pub value: i32,
}

/// How the viewer rated one teammate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvaluation {
    pub user_id: UserId,
    pub role: String,
    pub evaluated: bool,
    /// Empty until the viewer has rated this member.
    pub scores: Vec<ItemScoreView>,
}

/// A round as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub round: EvaluationRound,
    pub accepting_submissions: bool,
    pub items: Vec<EvaluationItem>,
    /// Every current member except the viewer, by user id.
    pub members: Vec<MemberEvaluation>,
}

impl Engine {
    pub fn round_view(&self, round_id: RoundId, viewer: UserId) -> Result<RoundView> {
        self.round_view_at(round_id, viewer, Self::unix_now())
    }

    /// Build the viewer's view of a round as of `now`.
    ///
    /// This is a pure read; an expired round is reported as not accepting
    /// submissions but is not closed here.
    pub fn round_view_at(&self, round_id: RoundId, viewer: UserId, now: i64) -> Result<RoundView> {
        let round = self.round(round_id)?;

        let members = self.members(round.team_id)?;
        if !members.contains_key(&viewer) {
            return Err(Error::Forbidden {
                user_id: viewer,
                team_id: round.team_id,
            });
        }

        let given = self
            .db
            .read(|conn| scores::by_evaluator(conn, round_id, viewer))?;

        let mut by_target: HashMap<UserId, Vec<ItemScoreView>> = HashMap::new();
        for score in given {
            let item_code = self
                .catalog
                .get(score.item_id)
                .map(|item| item.code.clone())
                .unwrap_or_default();
            by_target
                .entry(score.target_user_id)
                .or_default()
                .push(ItemScoreView {
                    item_id: score.item_id,
                    item_code,
                    value: score.value,
                });
        }

        let members = members
            .into_values()
            .filter(|member| member.user_id != viewer)
            .map(|member| {
                let scores = by_target.remove(&member.user_id).unwrap_or_default();
                MemberEvaluation {
                    user_id: member.user_id,
                    role: member.role,
                    evaluated: !scores.is_empty(),
                    scores,
                }
            })
            .collect();

        Ok(RoundView {
            accepting_submissions: round.accepts_submissions(now),
            round,
            items: self.catalog.items().to_vec(),
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::SubmissionRequest;
    use crate::test_support::{engine_with_team, uniform_scores};
    use ondo_core::{ItemScore, RoundStatus};

    #[test]
    fn test_view_before_any_submission() {
        let (engine, _) = engine_with_team(1, &[10, 11, 12]);
        let round = engine.open_round(1, 0, 5_000).unwrap();

        let view = engine.round_view_at(round.id, 10, 1_000).unwrap();
        assert!(view.accepting_submissions);
        assert_eq!(view.items.len(), engine.catalog().len());

        let ids: Vec<_> = view.members.iter().map(|m| m.user_id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert!(view.members.iter().all(|m| !m.evaluated && m.scores.is_empty()));
    }

    #[test]
    fn test_view_shows_own_scores_only() {
        let (engine, _) = engine_with_team(1, &[10, 11, 12]);
        let round = engine.open_round(1, 0, 5_000).unwrap();
        let first_item = engine.catalog().items()[0].clone();

        let mine = SubmissionRequest::new(round.id, 10, 11, vec![ItemScore::new(first_item.id, 4)]);
        engine.submit_at(&mine, 1_000).unwrap();
        let theirs = SubmissionRequest::new(round.id, 12, 11, uniform_scores(&engine, 2));
        engine.submit_at(&theirs, 1_000).unwrap();

        let view = engine.round_view_at(round.id, 10, 1_000).unwrap();
        let rated = &view.members[0];
        assert_eq!(rated.user_id, 11);
        assert!(rated.evaluated);
        assert_eq!(
            rated.scores,
            vec![ItemScoreView {
                item_id: first_item.id,
                item_code: first_item.code.clone(),
                value: 4,
            }]
        );
        assert!(!view.members[1].evaluated);
    }

    #[test]
    fn test_view_is_read_only_after_deadline() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 5_000).unwrap();

        let view = engine.round_view_at(round.id, 10, 9_000).unwrap();
        assert!(!view.accepting_submissions);
        assert_eq!(engine.round(round.id).unwrap().status, RoundStatus::Open);
    }

    #[test]
    fn test_view_requires_membership() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 5_000).unwrap();

        assert!(matches!(
            engine.round_view_at(round.id, 99, 1_000),
            Err(Error::Forbidden { user_id: 99, .. })
        ));
        assert!(matches!(
            engine.round_view_at(round.id + 1, 10, 1_000),
            Err(Error::RoundNotFound(_))
        ));
    }
}
