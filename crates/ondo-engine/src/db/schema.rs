//! SQLite schema for the evaluation ledger.

use rusqlite::Connection;

use crate::{Error, Result};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates all tables on a fresh database. Refuses to continue on a database
/// written by a newer schema version.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Graded dimensions (reference data)
        CREATE TABLE IF NOT EXISTS evaluation_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            scale_min INTEGER NOT NULL,
            scale_max INTEGER NOT NULL,
            CHECK (scale_min < scale_max)
        );

        -- One scoring period per team
        CREATE TABLE IF NOT EXISTS evaluation_round (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            opened_at INTEGER NOT NULL,
            closes_at INTEGER NOT NULL,
            CHECK (status IN ('open', 'closed', 'canceled'))
        );

        -- Append-only score ledger
        CREATE TABLE IF NOT EXISTS score (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            round_id INTEGER NOT NULL REFERENCES evaluation_round(id),
            evaluator_user_id INTEGER NOT NULL,
            target_user_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL REFERENCES evaluation_item(id),
            value INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (round_id, evaluator_user_id, target_user_id, item_id),
            CHECK (evaluator_user_id <> target_user_id)
        );

        -- One temperature row per user; version is the CAS token
        CREATE TABLE IF NOT EXISTS reputation_state (
            user_id INTEGER PRIMARY KEY,
            temperature REAL NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            CHECK (temperature >= 0.0 AND temperature <= 100.0)
        );

        CREATE INDEX IF NOT EXISTS idx_round_team ON evaluation_round(team_id, id);
        CREATE INDEX IF NOT EXISTS idx_round_status_closes ON evaluation_round(status, closes_at);
        CREATE INDEX IF NOT EXISTS idx_score_target ON score(target_user_id, evaluator_user_id);
        "#,
    )?;

    Ok(())
}
