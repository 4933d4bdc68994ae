//! Evaluation round queries and status transitions.

use ondo_core::{EvaluationRound, RoundId, RoundStatus, TeamId};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const ROUND_COLUMNS: &str = "id, team_id, status, opened_at, closes_at";

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<EvaluationRound> {
    let status: String = row.get(2)?;
    let status = status
        .parse::<RoundStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(EvaluationRound {
        id: row.get(0)?,
        team_id: row.get(1)?,
        status,
        opened_at: row.get(3)?,
        closes_at: row.get(4)?,
    })
}

pub(crate) fn insert(
    conn: &Connection,
    team_id: TeamId,
    opened_at: i64,
    closes_at: i64,
) -> Result<EvaluationRound> {
    conn.execute(
        "INSERT INTO evaluation_round (team_id, status, opened_at, closes_at) VALUES (?, ?, ?, ?)",
        rusqlite::params![team_id, RoundStatus::Open.as_str(), opened_at, closes_at],
    )?;

    Ok(EvaluationRound {
        id: conn.last_insert_rowid(),
        team_id,
        status: RoundStatus::Open,
        opened_at,
        closes_at,
    })
}

pub(crate) fn get(conn: &Connection, round_id: RoundId) -> Result<Option<EvaluationRound>> {
    let round = conn
        .query_row(
            &format!("SELECT {ROUND_COLUMNS} FROM evaluation_round WHERE id = ?"),
            [round_id],
            round_from_row,
        )
        .optional()?;
    Ok(round)
}

/// The team's current round: the one with the highest id.
pub(crate) fn current_for_team(
    conn: &Connection,
    team_id: TeamId,
) -> Result<Option<EvaluationRound>> {
    let round = conn
        .query_row(
            &format!(
                "SELECT {ROUND_COLUMNS} FROM evaluation_round
                 WHERE team_id = ? ORDER BY id DESC LIMIT 1"
            ),
            [team_id],
            round_from_row,
        )
        .optional()?;
    Ok(round)
}

/// Open rounds whose deadline lies strictly before `now`, oldest first.
pub(crate) fn expired_open(conn: &Connection, now: i64) -> Result<Vec<EvaluationRound>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROUND_COLUMNS} FROM evaluation_round
         WHERE status = ? AND closes_at < ? ORDER BY id"
    ))?;

    let rounds = stmt
        .query_map(
            rusqlite::params![RoundStatus::Open.as_str(), now],
            round_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rounds)
}

/// Move a round to `next` through the state machine.
///
/// The update is guarded on the stored status, so a round that changed
/// underneath the caller is reported as an invalid transition from its real
/// status.
pub(crate) fn transition(
    conn: &Connection,
    round: &EvaluationRound,
    next: RoundStatus,
) -> Result<EvaluationRound> {
    let status = round.status.transition_to(next)?;

    let updated = conn.execute(
        "UPDATE evaluation_round SET status = ? WHERE id = ? AND status = ?",
        rusqlite::params![status.as_str(), round.id, round.status.as_str()],
    )?;

    if updated == 0 {
        let stored = get(conn, round.id)?
            .map(|r| r.status)
            .unwrap_or(round.status);
        return Err(ondo_core::Error::InvalidTransition {
            from: stored,
            to: next,
        }
        .into());
    }

    Ok(EvaluationRound {
        status,
        ..round.clone()
    })
}
