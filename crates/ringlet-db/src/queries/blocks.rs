//! Block record queries.

use rusqlite::Connection;

use crate::Result;

/// Upsert a block record keyed by its remote URI.
pub fn upsert(
    conn: &Connection,
    uri: &str,
    ring_uri: &str,
    subject_did: &str,
    reason: Option<&str>,
    created_at: Option<u64>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO block_records (uri, ring_uri, subject_did, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![uri, ring_uri, subject_did, reason, created_at.map(|t| t as i64)],
    )?;
    Ok(())
}

/// Whether an actor is blocked from a ring.
pub fn is_blocked(conn: &Connection, ring_uri: &str, subject_did: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM block_records WHERE ring_uri = ?1 AND subject_did = ?2",
        [ring_uri, subject_did],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// List blocks scoped to a ring.
pub fn list_for_ring(conn: &Connection, ring_uri: &str) -> Result<Vec<BlockRow>> {
    let mut stmt = conn.prepare(
        "SELECT uri, ring_uri, subject_did, reason, created_at
         FROM block_records WHERE ring_uri = ?1 ORDER BY uri",
    )?;
    let rows = stmt
        .query_map([ring_uri], row_to_block)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete all block rows whose record lives in the given actor's repository
/// (URI authority = actor). Used by account teardown.
pub fn delete_authored_by(conn: &Connection, did: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM block_records WHERE uri LIKE 'at://' || ?1 || '/%'",
        [did],
    )?;
    Ok(deleted)
}

fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok(BlockRow {
        uri: row.get(0)?,
        ring_uri: row.get(1)?,
        subject_did: row.get(2)?,
        reason: row.get(3)?,
        created_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
    })
}

/// A raw block row from the database.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub uri: String,
    pub ring_uri: String,
    pub subject_did: String,
    pub reason: Option<String>,
    pub created_at: Option<u64>,
}
