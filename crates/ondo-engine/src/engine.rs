//! The evaluation engine facade.
//!
//! [`Engine`] owns the database handle, the membership provider and the
//! cached item catalog. Round administration and reputation reads live here;
//! submissions, the auto-fill sweep and the read model are implemented in
//! their own modules as further `impl Engine` blocks.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ondo_core::catalog::ItemCatalog;
use ondo_core::{EvaluationRound, ReputationState, RoundId, RoundStatus, TeamId, UserId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::db::{Database, items, rounds, scores};
use crate::membership::{MembershipProvider, SqliteMembership, TeamMember};
use crate::reputation::{self, DEFAULT_MAX_ATTEMPTS, ReputationAggregator};
use crate::{Error, Result};

/// Which rounds count when measuring how many distinct evaluators a target
/// already has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorScope {
    /// Every round the target was ever rated in.
    #[default]
    Lifetime,
    /// Only the round being scored.
    Round,
}

impl EvaluatorScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lifetime => "lifetime",
            Self::Round => "round",
        }
    }

    /// Round filter for the ledger query, `None` meaning all rounds.
    pub fn round_filter(&self, round_id: RoundId) -> Option<RoundId> {
        match self {
            Self::Lifetime => None,
            Self::Round => Some(round_id),
        }
    }
}

impl fmt::Display for EvaluatorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluatorScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lifetime" => Ok(Self::Lifetime),
            "round" => Ok(Self::Round),
            other => Err(format!(
                "unknown evaluator scope '{}' (expected 'lifetime' or 'round')",
                other
            )),
        }
    }
}

/// Tunables of the engine that do not concern storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub evaluator_scope: EvaluatorScope,
    pub max_update_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            evaluator_scope: EvaluatorScope::default(),
            max_update_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Peer-evaluation engine.
pub struct Engine {
    pub(crate) db: Database,
    membership: Arc<dyn MembershipProvider>,
    pub(crate) settings: EngineSettings,
    pub(crate) aggregator: ReputationAggregator,
    /// Reference data, loaded once at construction.
    pub(crate) catalog: ItemCatalog,
}

impl Engine {
    pub fn new(
        db: Database,
        membership: Arc<dyn MembershipProvider>,
        settings: EngineSettings,
    ) -> Result<Self> {
        let catalog = db.read(items::load_catalog)?;
        if catalog.is_empty() {
            return Err(Error::Config("evaluation item catalog is empty".to_string()));
        }

        Ok(Self {
            db,
            membership,
            settings,
            aggregator: ReputationAggregator::new(settings.max_update_attempts),
            catalog,
        })
    }

    /// Open the database and the SQLite membership adapter named by `config`.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let db = Database::open(&config.db_path, config.busy_timeout)?;
        let membership = SqliteMembership::open(config.membership_path())?;
        Self::new(db, Arc::new(membership), config.settings())
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Open a new round for `team_id`; it becomes the team's current round.
    pub fn open_round(
        &self,
        team_id: TeamId,
        opened_at: i64,
        closes_at: i64,
    ) -> Result<EvaluationRound> {
        if closes_at <= opened_at {
            return Err(Error::InvalidRoundWindow {
                opened_at,
                closes_at,
            });
        }

        let round = self
            .db
            .write(|tx| rounds::insert(tx, team_id, opened_at, closes_at))?;

        tracing::info!(
            round_id = round.id,
            team_id,
            closes_at,
            "evaluation round opened"
        );
        Ok(round)
    }

    /// Administratively cancel an open round.
    pub fn cancel_round(&self, round_id: RoundId) -> Result<EvaluationRound> {
        let round = self.db.write(|tx| {
            let round = rounds::get(tx, round_id)?.ok_or(Error::RoundNotFound(round_id))?;
            rounds::transition(tx, &round, RoundStatus::Canceled)
        })?;

        tracing::info!(round_id, team_id = round.team_id, "evaluation round canceled");
        Ok(round)
    }

    pub fn round(&self, round_id: RoundId) -> Result<EvaluationRound> {
        self.db
            .read(|conn| rounds::get(conn, round_id))?
            .ok_or(Error::RoundNotFound(round_id))
    }

    /// The team's most recent round, if it ever had one.
    pub fn current_round(&self, team_id: TeamId) -> Result<Option<EvaluationRound>> {
        self.db.read(|conn| rounds::current_for_team(conn, team_id))
    }

    /// Number of score rows recorded for a round.
    pub fn score_count(&self, round_id: RoundId) -> Result<u64> {
        self.db.read(|conn| scores::count_for_round(conn, round_id))
    }

    // =========================================================================
    // Reputation
    // =========================================================================

    /// Current reputation; users never rated report the default temperature.
    pub fn reputation(&self, user_id: UserId) -> Result<ReputationState> {
        self.db.read(|conn| reputation::get(conn, user_id))
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    /// Current team members keyed (and de-duplicated) by user id.
    pub(crate) fn members(&self, team_id: TeamId) -> Result<BTreeMap<UserId, TeamMember>> {
        let members = self.membership.list_members(team_id)?;
        Ok(members.into_iter().map(|m| (m.user_id, m)).collect())
    }

    /// Distinct evaluators other than `evaluator` who have rated `target`,
    /// within the configured scope.
    pub(crate) fn prior_evaluators(
        &self,
        conn: &Connection,
        target: UserId,
        evaluator: UserId,
        round_id: RoundId,
    ) -> Result<u64> {
        let round = self.settings.evaluator_scope.round_filter(round_id);
        let mut seen = scores::evaluators_of(conn, target, round)?;
        seen.remove(&evaluator);
        Ok(seen.len() as u64)
    }

    /// Current Unix timestamp in seconds.
    pub fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::test_support::engine_with_team;

    #[test]
    fn test_scope_parse() {
        assert_eq!(
            "lifetime".parse::<EvaluatorScope>(),
            Ok(EvaluatorScope::Lifetime)
        );
        assert_eq!("Round".parse::<EvaluatorScope>(), Ok(EvaluatorScope::Round));
        assert!("team".parse::<EvaluatorScope>().is_err());
        assert_eq!(EvaluatorScope::Lifetime.round_filter(4), None);
        assert_eq!(EvaluatorScope::Round.round_filter(4), Some(4));
    }

    #[test]
    fn test_open_round_rejects_empty_window() {
        let (engine, _) = engine_with_team(1, &[10, 11]);

        let err = engine.open_round(1, 500, 500).unwrap_err();
        assert!(matches!(err, Error::InvalidRoundWindow { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(engine.current_round(1).unwrap().is_none());
    }

    #[test]
    fn test_current_round_tracks_latest() {
        let (engine, _) = engine_with_team(1, &[10, 11]);

        engine.open_round(1, 0, 100).unwrap();
        let latest = engine.open_round(1, 200, 300).unwrap();

        assert_eq!(engine.current_round(1).unwrap().unwrap().id, latest.id);
        assert_eq!(engine.round(latest.id).unwrap(), latest);
        assert!(matches!(
            engine.round(latest.id + 10),
            Err(Error::RoundNotFound(_))
        ));
    }

    #[test]
    fn test_cancel_round_is_terminal() {
        let (engine, _) = engine_with_team(1, &[10, 11]);
        let round = engine.open_round(1, 0, 100).unwrap();

        let canceled = engine.cancel_round(round.id).unwrap();
        assert_eq!(canceled.status, RoundStatus::Canceled);

        let err = engine.cancel_round(round.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(matches!(
            engine.cancel_round(999),
            Err(Error::RoundNotFound(999))
        ));
    }

    #[test]
    fn test_reputation_defaults_for_unknown_user() {
        let (engine, _) = engine_with_team(1, &[10]);
        let state = engine.reputation(42).unwrap();
        assert_eq!(state.temperature, ondo_core::DEFAULT_TEMPERATURE);
        assert!(state.updated_at.is_none());
    }

    #[test]
    fn test_members_deduplicated() {
        let (engine, membership) = engine_with_team(1, &[10, 11]);
        membership.set_team(
            1,
            vec![
                TeamMember::new(11, "member"),
                TeamMember::new(10, "leader"),
                TeamMember::new(11, "member"),
            ],
        );

        let members = engine.members(1).unwrap();
        assert_eq!(members.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert!(engine.members(2).unwrap().is_empty());
    }
}
