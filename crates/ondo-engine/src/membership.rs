//! Team membership provider seam.
//!
//! Membership is owned by the platform's team management; the engine only
//! reads it. Two adapters are provided:
//! - [`StaticMembership`]: in-memory map, for embedding and tests
//! - [`SqliteMembership`]: read-only query on a `team_member` table

use std::collections::HashMap;
use std::path::Path;

use ondo_core::{TeamId, UserId};
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One member of a team as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: UserId,
    pub role: String,
}

impl TeamMember {
    pub fn new(user_id: UserId, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }
}

/// Source of the current membership of a team.
pub trait MembershipProvider: Send + Sync {
    /// List the team's current members. An unknown team has no members.
    fn list_members(&self, team_id: TeamId) -> Result<Vec<TeamMember>>;
}

/// In-memory membership.
#[derive(Debug, Default)]
pub struct StaticMembership {
    teams: RwLock<HashMap<TeamId, Vec<TeamMember>>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a team's member list.
    pub fn set_team(&self, team_id: TeamId, members: Vec<TeamMember>) {
        self.teams.write().insert(team_id, members);
    }

    pub fn remove_member(&self, team_id: TeamId, user_id: UserId) {
        if let Some(members) = self.teams.write().get_mut(&team_id) {
            members.retain(|m| m.user_id != user_id);
        }
    }
}

impl MembershipProvider for StaticMembership {
    fn list_members(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
        Ok(self.teams.read().get(&team_id).cloned().unwrap_or_default())
    }
}

/// Membership read from a `team_member(team_id, user_id, role)` table.
pub struct SqliteMembership {
    conn: Mutex<Connection>,
}

impl SqliteMembership {
    /// Open the platform database read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            Error::Membership(format!(
                "failed to open membership database {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!("Membership database connected: {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl MembershipProvider for SqliteMembership {
    fn list_members(&self, team_id: TeamId) -> Result<Vec<TeamMember>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT user_id, role FROM team_member WHERE team_id = ? ORDER BY user_id")
            .map_err(|e| Error::Membership(e.to_string()))?;

        let members = stmt
            .query_map([team_id], |row| {
                Ok(TeamMember {
                    user_id: row.get(0)?,
                    role: row.get(1)?,
                })
            })
            .map_err(|e| Error::Membership(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Membership(e.to_string()))?;

        Ok(members)
    }
}
