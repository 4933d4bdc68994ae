//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::Arc;

use ondo_core::{ItemScore, TeamId, UserId};

use crate::db::{DEFAULT_BUSY_TIMEOUT, Database};
use crate::engine::{Engine, EngineSettings};
use crate::membership::{StaticMembership, TeamMember};

/// In-memory engine with one team whose members all have the `member` role.
pub(crate) fn engine_with_team(
    team_id: TeamId,
    members: &[UserId],
) -> (Engine, Arc<StaticMembership>) {
    engine_with_settings(team_id, members, EngineSettings::default())
}

pub(crate) fn engine_with_settings(
    team_id: TeamId,
    members: &[UserId],
    settings: EngineSettings,
) -> (Engine, Arc<StaticMembership>) {
    let membership = Arc::new(StaticMembership::new());
    membership.set_team(team_id, team(members));

    let db = Database::open_in_memory().unwrap();
    let engine = Engine::new(db, membership.clone(), settings).unwrap();
    (engine, membership)
}

/// Engine on a database file, so several engines can share one store.
pub(crate) fn file_engine(path: &Path, membership: Arc<StaticMembership>) -> Engine {
    let db = Database::open(path, DEFAULT_BUSY_TIMEOUT).unwrap();
    Engine::new(db, membership, EngineSettings::default()).unwrap()
}

pub(crate) fn team(members: &[UserId]) -> Vec<TeamMember> {
    members
        .iter()
        .map(|&user_id| TeamMember::new(user_id, "member"))
        .collect()
}

/// The same value for every catalog item.
pub(crate) fn uniform_scores(engine: &Engine, value: i32) -> Vec<ItemScore> {
    engine
        .catalog()
        .items()
        .iter()
        .map(|item| ItemScore::new(item.id, value))
        .collect()
}
