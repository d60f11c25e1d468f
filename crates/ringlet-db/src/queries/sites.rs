//! Site queries. A site is a participant's web property, exclusively owned
//! by its actor.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Ensure a site row exists for (actor, url), returning its id.
///
/// An existing row keeps its description and active flag; title and feed URL
/// are refreshed from the caller.
pub fn ensure(
    conn: &Connection,
    user_did: &str,
    url: &str,
    title: &str,
    rss_url: Option<&str>,
    now: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sites (user_did, url, title, rss_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_did, url) DO UPDATE SET
             title = excluded.title,
             rss_url = COALESCE(excluded.rss_url, rss_url)",
        rusqlite::params![user_did, url, title, rss_url, now as i64],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM sites WHERE user_did = ?1 AND url = ?2",
        [user_did, url],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Get a site by id.
pub fn get(conn: &Connection, id: i64) -> Result<SiteRow> {
    conn.query_row(
        "SELECT id, user_did, url, title, description, rss_url, active, created_at
         FROM sites WHERE id = ?1",
        [id],
        row_to_site,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("site".into()),
        other => DbError::Sqlite(other),
    })
}

/// List the URLs of all active sites, for global random navigation.
pub fn active_urls(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT url FROM sites WHERE active = 1 ORDER BY created_at, id")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// List an actor's sites.
pub fn list_for_user(conn: &Connection, user_did: &str) -> Result<Vec<SiteRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_did, url, title, description, rss_url, active, created_at
         FROM sites WHERE user_did = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([user_did], row_to_site)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete all of an actor's sites. Their memberships must go first
/// (memberships hold a foreign key into this table).
pub fn remove_for_user(conn: &Connection, user_did: &str) -> Result<()> {
    conn.execute("DELETE FROM sites WHERE user_did = ?1", [user_did])?;
    Ok(())
}

fn row_to_site(row: &rusqlite::Row<'_>) -> rusqlite::Result<SiteRow> {
    Ok(SiteRow {
        id: row.get(0)?,
        user_did: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        rss_url: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

/// A raw site row from the database.
#[derive(Debug, Clone)]
pub struct SiteRow {
    pub id: i64,
    pub user_did: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub rss_url: Option<String>,
    pub active: bool,
    pub created_at: u64,
}
