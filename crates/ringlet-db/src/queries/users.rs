//! Actor registry queries.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Register an actor. Re-registering updates the handle and PDS URL.
pub fn upsert(
    conn: &Connection,
    did: &str,
    handle: Option<&str>,
    pds_url: Option<&str>,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (did, handle, pds_url, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(did) DO UPDATE SET
             handle = COALESCE(excluded.handle, handle),
             pds_url = COALESCE(excluded.pds_url, pds_url)",
        rusqlite::params![did, handle, pds_url, now as i64],
    )?;
    Ok(())
}

/// Get one actor.
pub fn get(conn: &Connection, did: &str) -> Result<UserRow> {
    conn.query_row(
        "SELECT did, handle, pds_url, created_at, last_synced_at
         FROM users WHERE did = ?1",
        [did],
        row_to_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("user".into()),
        other => DbError::Sqlite(other),
    })
}

/// List all registered actors, oldest first.
pub fn list(conn: &Connection) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT did, handle, pds_url, created_at, last_synced_at
         FROM users ORDER BY created_at, did",
    )?;
    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record a completed sync for an actor.
pub fn touch_synced(conn: &Connection, did: &str, now: u64) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_synced_at = ?2 WHERE did = ?1",
        rusqlite::params![did, now as i64],
    )?;
    Ok(())
}

/// Remove an actor's registry row.
pub fn remove(conn: &Connection, did: &str) -> Result<()> {
    conn.execute("DELETE FROM users WHERE did = ?1", [did])?;
    Ok(())
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        did: row.get(0)?,
        handle: row.get(1)?,
        pds_url: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
        last_synced_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
    })
}

/// A raw user row from the database.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub did: String,
    pub handle: Option<String>,
    pub pds_url: Option<String>,
    pub created_at: u64,
    pub last_synced_at: Option<u64>,
}
