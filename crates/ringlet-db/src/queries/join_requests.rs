//! Join request queries.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Insert a pending join request. Returns the new row id.
#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    ring_uri: &str,
    user_did: &str,
    site_url: &str,
    site_title: &str,
    rss_url: Option<&str>,
    message: Option<&str>,
    atproto_uri: Option<&str>,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO join_requests (ring_uri, user_did, site_url, site_title, rss_url,
                                    message, status, atproto_uri, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8)",
        rusqlite::params![
            ring_uri,
            user_did,
            site_url,
            site_title,
            rss_url,
            message,
            atproto_uri,
            created_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a request by id.
pub fn get(conn: &Connection, id: i64) -> Result<RequestRow> {
    conn.query_row(
        "SELECT id, ring_uri, user_did, site_url, site_title, rss_url, message,
                status, atproto_uri, created_at
         FROM join_requests WHERE id = ?1",
        [id],
        row_to_request,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("join request".into()),
        other => DbError::Sqlite(other),
    })
}

/// Find an actor's pending request for a ring, if any.
pub fn pending_for(
    conn: &Connection,
    ring_uri: &str,
    user_did: &str,
) -> Result<Option<RequestRow>> {
    let result = conn.query_row(
        "SELECT id, ring_uri, user_did, site_url, site_title, rss_url, message,
                status, atproto_uri, created_at
         FROM join_requests
         WHERE ring_uri = ?1 AND user_did = ?2 AND status = 'pending'",
        [ring_uri, user_did],
        row_to_request,
    );
    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::Sqlite(e)),
    }
}

/// List pending requests for a ring, oldest first.
pub fn list_pending(conn: &Connection, ring_uri: &str) -> Result<Vec<RequestRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, ring_uri, user_did, site_url, site_title, rss_url, message,
                status, atproto_uri, created_at
         FROM join_requests
         WHERE ring_uri = ?1 AND status = 'pending'
         ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([ring_uri], row_to_request)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Count pending requests for a ring.
pub fn pending_count(conn: &Connection, ring_uri: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM join_requests WHERE ring_uri = ?1 AND status = 'pending'",
        [ring_uri],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Move a request to a decided status.
pub fn set_status(conn: &Connection, id: i64, status: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE join_requests SET status = ?2 WHERE id = ?1",
        rusqlite::params![id, status],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("join request".into()));
    }
    Ok(())
}

/// Delete an actor's pending requests in one ring (leave, block cleanup).
pub fn delete_pending_for_actor(
    conn: &Connection,
    ring_uri: &str,
    user_did: &str,
) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM join_requests
         WHERE ring_uri = ?1 AND user_did = ?2 AND status = 'pending'",
        [ring_uri, user_did],
    )?;
    Ok(deleted)
}

/// Delete all of an actor's requests across all rings (account teardown).
pub fn delete_by_user(conn: &Connection, user_did: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM join_requests WHERE user_did = ?1", [user_did])?;
    Ok(deleted)
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        ring_uri: row.get(1)?,
        user_did: row.get(2)?,
        site_url: row.get(3)?,
        site_title: row.get(4)?,
        rss_url: row.get(5)?,
        message: row.get(6)?,
        status: row.get(7)?,
        atproto_uri: row.get(8)?,
        created_at: row.get::<_, i64>(9)? as u64,
    })
}

/// A raw join request row from the database.
#[derive(Debug, Clone)]
pub struct RequestRow {
    pub id: i64,
    pub ring_uri: String,
    pub user_did: String,
    pub site_url: String,
    pub site_title: String,
    pub rss_url: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub atproto_uri: Option<String>,
    pub created_at: u64,
}
