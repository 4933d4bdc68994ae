//! Score ledger queries.
//!
//! The ledger is append-only: rows are inserted once per real submission or
//! auto-filled pair and never updated or deleted.

use std::collections::HashSet;

use ondo_core::{ItemScore, RoundId, Score, UserId};
use rusqlite::{Connection, Row};

use crate::Result;

const SCORE_COLUMNS: &str =
    "id, round_id, evaluator_user_id, target_user_id, item_id, value, created_at";

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<Score> {
    Ok(Score {
        id: row.get(0)?,
        round_id: row.get(1)?,
        evaluator_user_id: row.get(2)?,
        target_user_id: row.get(3)?,
        item_id: row.get(4)?,
        value: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert one score row. Fails on a uniqueness violation.
pub(crate) fn insert(
    conn: &Connection,
    round_id: RoundId,
    evaluator: UserId,
    target: UserId,
    score: &ItemScore,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO score (round_id, evaluator_user_id, target_user_id, item_id, value, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        rusqlite::params![round_id, evaluator, target, score.item_id, score.value, now],
    )?;
    Ok(())
}

/// Insert one score row unless the (round, evaluator, target, item) key exists.
///
/// Returns whether a row was written.
pub(crate) fn insert_if_absent(
    conn: &Connection,
    round_id: RoundId,
    evaluator: UserId,
    target: UserId,
    score: &ItemScore,
    now: i64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO score
            (round_id, evaluator_user_id, target_user_id, item_id, value, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        rusqlite::params![round_id, evaluator, target, score.item_id, score.value, now],
    )?;
    Ok(inserted == 1)
}

/// Whether the evaluator already rated the target in this round.
pub(crate) fn has_submission(
    conn: &Connection,
    round_id: RoundId,
    evaluator: UserId,
    target: UserId,
) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM score
            WHERE round_id = ? AND evaluator_user_id = ? AND target_user_id = ?
         )",
        rusqlite::params![round_id, evaluator, target],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn for_round(conn: &Connection, round_id: RoundId) -> Result<Vec<Score>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCORE_COLUMNS} FROM score WHERE round_id = ? ORDER BY id"
    ))?;
    let scores = stmt
        .query_map([round_id], score_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(scores)
}

pub(crate) fn by_evaluator(
    conn: &Connection,
    round_id: RoundId,
    evaluator: UserId,
) -> Result<Vec<Score>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCORE_COLUMNS} FROM score
         WHERE round_id = ? AND evaluator_user_id = ? ORDER BY target_user_id, item_id"
    ))?;
    let scores = stmt
        .query_map(rusqlite::params![round_id, evaluator], score_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(scores)
}

/// Distinct evaluators who have rated `target`.
///
/// With `round` set, only that round's rows count; otherwise every round does.
pub(crate) fn evaluators_of(
    conn: &Connection,
    target: UserId,
    round: Option<RoundId>,
) -> Result<HashSet<UserId>> {
    let evaluators = match round {
        Some(round_id) => conn
            .prepare(
                "SELECT DISTINCT evaluator_user_id FROM score
                 WHERE target_user_id = ? AND round_id = ?",
            )?
            .query_map(rusqlite::params![target, round_id], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?,
        None => conn
            .prepare("SELECT DISTINCT evaluator_user_id FROM score WHERE target_user_id = ?")?
            .query_map([target], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?,
    };
    Ok(evaluators)
}

pub(crate) fn count_for_round(conn: &Connection, round_id: RoundId) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM score WHERE round_id = ?",
        [round_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
