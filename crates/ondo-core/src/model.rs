//! Evaluation data model.
//!
//! Identifiers are platform-wide `i64` values and all timestamps are Unix
//! seconds (UTC).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_TEMPERATURE, Error, Result};

pub type UserId = i64;
pub type TeamId = i64;
pub type RoundId = i64;
pub type ItemId = i64;

/// Status of an evaluation round.
///
/// `Open` is the only non-terminal state. A round leaves it either by
/// closing (deadline reached) or by administrative cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Open,
    Closed,
    Canceled,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether no further scores may be written in this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Validate a transition against the round state machine.
    ///
    /// Returns the new status on success.
    pub fn transition_to(self, next: RoundStatus) -> Result<RoundStatus> {
        match (self, next) {
            (Self::Open, Self::Closed) | (Self::Open, Self::Canceled) => Ok(next),
            (from, to) => Err(Error::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "canceled" => Ok(Self::Canceled),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// A graded dimension members are rated on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub id: ItemId,
    /// Stable unique code (e.g. `communication`).
    pub code: String,
    pub display_name: String,
    /// Inclusive lower bound of accepted values.
    pub scale_min: i32,
    /// Inclusive upper bound of accepted values.
    pub scale_max: i32,
}

impl EvaluationItem {
    /// Build an item, rejecting empty or inverted ranges.
    pub fn new(
        id: ItemId,
        code: impl Into<String>,
        display_name: impl Into<String>,
        scale_min: i32,
        scale_max: i32,
    ) -> Result<Self> {
        let code = code.into();
        if scale_min >= scale_max {
            return Err(Error::InvalidScale {
                code,
                min: scale_min,
                max: scale_max,
            });
        }
        Ok(Self {
            id,
            code,
            display_name: display_name.into(),
            scale_min,
            scale_max,
        })
    }

    /// Whether `value` falls inside this item's configured range.
    pub fn accepts(&self, value: i32) -> bool {
        (self.scale_min..=self.scale_max).contains(&value)
    }
}

/// One scoring period for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRound {
    pub id: RoundId,
    pub team_id: TeamId,
    pub status: RoundStatus,
    pub opened_at: i64,
    pub closes_at: i64,
}

impl EvaluationRound {
    /// Whether the round's deadline lies strictly before `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.closes_at < now
    }

    /// Whether the round is open and still inside its window at `now`.
    pub fn accepts_submissions(&self, now: i64) -> bool {
        self.status == RoundStatus::Open && !self.is_expired(now)
    }
}

/// A single value an evaluator gave a target on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_id: ItemId,
    pub value: i32,
}

impl ItemScore {
    pub fn new(item_id: ItemId, value: i32) -> Self {
        Self { item_id, value }
    }
}

/// A row of the append-only score ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub round_id: RoundId,
    pub evaluator_user_id: UserId,
    pub target_user_id: UserId,
    pub item_id: ItemId,
    pub value: i32,
    pub created_at: i64,
}

/// A user's current reputation temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationState {
    pub user_id: UserId,
    /// Always within `[0.0, 100.0]`.
    pub temperature: f64,
    /// Unix seconds of the last update, `None` if never rated.
    pub updated_at: Option<i64>,
}

impl ReputationState {
    /// State of a user who has not received any rating yet.
    pub fn initial(user_id: UserId) -> Self {
        Self {
            user_id,
            temperature: DEFAULT_TEMPERATURE,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_status_roundtrip() {
        for status in [RoundStatus::Open, RoundStatus::Closed, RoundStatus::Canceled] {
            assert_eq!(RoundStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(matches!(
            RoundStatus::from_str("OPEN"),
            Err(Error::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_round_status_transitions() {
        assert_eq!(
            RoundStatus::Open.transition_to(RoundStatus::Closed),
            Ok(RoundStatus::Closed)
        );
        assert_eq!(
            RoundStatus::Open.transition_to(RoundStatus::Canceled),
            Ok(RoundStatus::Canceled)
        );

        // Terminal states never move, and open cannot re-open itself
        for (from, to) in [
            (RoundStatus::Open, RoundStatus::Open),
            (RoundStatus::Closed, RoundStatus::Open),
            (RoundStatus::Closed, RoundStatus::Canceled),
            (RoundStatus::Canceled, RoundStatus::Closed),
            (RoundStatus::Canceled, RoundStatus::Open),
        ] {
            assert_eq!(
                from.transition_to(to),
                Err(Error::InvalidTransition { from, to })
            );
        }
    }

    #[test]
    fn test_round_status_terminal() {
        assert!(!RoundStatus::Open.is_terminal());
        assert!(RoundStatus::Closed.is_terminal());
        assert!(RoundStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_round_status_serde_lowercase() {
        let json = serde_json::to_string(&RoundStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
    }

    #[test]
    fn test_item_rejects_inverted_scale() {
        assert!(EvaluationItem::new(1, "x", "X", 5, 1).is_err());
        assert!(EvaluationItem::new(1, "x", "X", 3, 3).is_err());
    }

    #[test]
    fn test_item_accepts_inclusive_range() {
        let item = EvaluationItem::new(1, "communication", "Communication", 1, 5).unwrap();
        assert!(item.accepts(1));
        assert!(item.accepts(5));
        assert!(!item.accepts(0));
        assert!(!item.accepts(6));
    }

    #[test]
    fn test_round_expiry() {
        let round = EvaluationRound {
            id: 1,
            team_id: 7,
            status: RoundStatus::Open,
            opened_at: 1_000,
            closes_at: 2_000,
        };
        assert!(!round.is_expired(1_999));
        assert!(!round.is_expired(2_000));
        assert!(round.is_expired(2_001));
        assert!(round.accepts_submissions(1_500));
        assert!(!round.accepts_submissions(2_001));

        let closed = EvaluationRound {
            status: RoundStatus::Closed,
            ..round
        };
        assert!(!closed.accepts_submissions(1_500));
    }

    #[test]
    fn test_initial_reputation() {
        let state = ReputationState::initial(42);
        assert_eq!(state.user_id, 42);
        assert_eq!(state.temperature, DEFAULT_TEMPERATURE);
        assert!(state.updated_at.is_none());
    }
}
