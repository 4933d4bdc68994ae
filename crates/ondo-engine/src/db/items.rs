//! Evaluation item catalog queries.

use ondo_core::EvaluationItem;
use ondo_core::catalog::{ItemCatalog, ItemSeed};
use rusqlite::Connection;

use crate::Result;

/// Insert seed items that are not present yet (matched by code).
///
/// Returns the number of newly inserted items.
pub(crate) fn seed_items(conn: &Connection, seeds: &[ItemSeed]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO evaluation_item (code, display_name, scale_min, scale_max)
         VALUES (?, ?, ?, ?)",
    )?;

    let mut inserted = 0;
    for seed in seeds {
        inserted += stmt.execute(rusqlite::params![
            seed.code,
            seed.display_name,
            seed.scale_min,
            seed.scale_max
        ])?;
    }

    Ok(inserted)
}

/// Load the full catalog ordered by id.
pub(crate) fn load_catalog(conn: &Connection) -> Result<ItemCatalog> {
    let mut stmt = conn.prepare(
        "SELECT id, code, display_name, scale_min, scale_max
         FROM evaluation_item ORDER BY id",
    )?;

    let items = stmt
        .query_map([], |row| {
            Ok(EvaluationItem {
                id: row.get(0)?,
                code: row.get(1)?,
                display_name: row.get(2)?,
                scale_min: row.get(3)?,
                scale_max: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ItemCatalog::new(items))
}
