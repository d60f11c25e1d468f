//! Membership queries.
//!
//! A membership row is derived from the member's sidecar record (or the
//! ring-space copy created on approval) and carries the locally-owned
//! moderation status. Sync upserts refresh the remote-derived fields but
//! never reset a locally-set status.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Upsert a membership from a synced sidecar record.
///
/// Keyed logically by (ring, site); the record URI and creation time are
/// refreshed, the status column is left alone so a suspension survives
/// re-sync. A stale row holding the same member URI under a different
/// (ring, site) pair is replaced outright.
pub fn upsert_synced(
    conn: &Connection,
    ring_uri: &str,
    site_id: i64,
    member_uri: &str,
    created_at: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE memberships SET member_uri = ?3, created_at = ?4
         WHERE ring_uri = ?1 AND site_id = ?2",
        rusqlite::params![ring_uri, site_id, member_uri, created_at as i64],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT OR REPLACE INTO memberships (ring_uri, site_id, member_uri, status, created_at)
             VALUES (?1, ?2, ?3, 'approved', ?4)",
            rusqlite::params![ring_uri, site_id, member_uri, created_at as i64],
        )?;
    }
    Ok(())
}

/// Insert an approved membership row, e.g. when an owner approves a join
/// request. Returns false when the (ring, site) pair already has a row
/// (idempotent re-approval).
pub fn insert_approved(
    conn: &Connection,
    ring_uri: &str,
    site_id: i64,
    member_uri: &str,
    created_at: u64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO memberships (ring_uri, site_id, member_uri, status, created_at)
         VALUES (?1, ?2, ?3, 'approved', ?4)",
        rusqlite::params![ring_uri, site_id, member_uri, created_at as i64],
    )?;
    Ok(inserted > 0)
}

/// Find an actor's membership in a ring, through their site rows.
pub fn find_for_actor(
    conn: &Connection,
    ring_uri: &str,
    user_did: &str,
) -> Result<Option<MembershipRow>> {
    let result = conn.query_row(
        "SELECT m.id, m.ring_uri, m.site_id, m.member_uri, m.status,
                m.widget_installed, m.last_verified_at, m.created_at
         FROM memberships m JOIN sites s ON s.id = m.site_id
         WHERE m.ring_uri = ?1 AND s.user_did = ?2",
        [ring_uri, user_did],
        row_to_membership,
    );
    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::Sqlite(e)),
    }
}

/// Set the moderation status of an actor's membership in a ring. Returns
/// the number of rows changed (0 when no membership exists).
pub fn set_status_for_actor(
    conn: &Connection,
    ring_uri: &str,
    user_did: &str,
    status: &str,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE memberships SET status = ?3
         WHERE ring_uri = ?1
           AND site_id IN (SELECT id FROM sites WHERE user_did = ?2)",
        rusqlite::params![ring_uri, user_did, status],
    )?;
    Ok(changed)
}

/// Delete an actor's membership rows in a ring (kick, leave, block cleanup).
pub fn delete_for_actor(conn: &Connection, ring_uri: &str, user_did: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM memberships
         WHERE ring_uri = ?1
           AND site_id IN (SELECT id FROM sites WHERE user_did = ?2)",
        rusqlite::params![ring_uri, user_did],
    )?;
    Ok(deleted)
}

/// Delete every membership held by an actor across all rings.
pub fn delete_by_user(conn: &Connection, user_did: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM memberships
         WHERE site_id IN (SELECT id FROM sites WHERE user_did = ?1)",
        [user_did],
    )?;
    Ok(deleted)
}

/// The canonical traversal order of a ring: approved members' site URLs in
/// join order. `created_at` ascending, row id as the stable tiebreak.
pub fn approved_urls(conn: &Connection, ring_uri: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT s.url FROM memberships m JOIN sites s ON s.id = m.site_id
         WHERE m.ring_uri = ?1 AND m.status = 'approved'
         ORDER BY m.created_at, m.id",
    )?;
    let rows = stmt
        .query_map([ring_uri], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Count approved members of a ring.
pub fn approved_count(conn: &Connection, ring_uri: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE ring_uri = ?1 AND status = 'approved'",
        [ring_uri],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Count pending members of a ring.
pub fn pending_count(conn: &Connection, ring_uri: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE ring_uri = ?1 AND status = 'pending'",
        [ring_uri],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Store the result of a widget-verification check on a membership row.
pub fn set_widget(conn: &Connection, member_uri: &str, installed: bool, now: u64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE memberships SET widget_installed = ?2, last_verified_at = ?3
         WHERE member_uri = ?1",
        rusqlite::params![member_uri, installed, now as i64],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("membership".into()));
    }
    Ok(())
}

fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<MembershipRow> {
    Ok(MembershipRow {
        id: row.get(0)?,
        ring_uri: row.get(1)?,
        site_id: row.get(2)?,
        member_uri: row.get(3)?,
        status: row.get(4)?,
        widget_installed: row.get(5)?,
        last_verified_at: row.get::<_, Option<i64>>(6)?.map(|t| t as u64),
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

/// A raw membership row from the database.
#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub id: i64,
    pub ring_uri: String,
    pub site_id: i64,
    pub member_uri: Option<String>,
    pub status: String,
    pub widget_installed: Option<bool>,
    pub last_verified_at: Option<u64>,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{rings, sites};

    const RING: &str = "at://did:plc:owner/net.ringlet.ring/1";

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        rings::insert_stub(&conn, RING, "did:plc:owner", "loading", 1).expect("ring stub");
        conn
    }

    fn member_site(conn: &Connection, did: &str, url: &str, at: u64) -> i64 {
        sites::ensure(conn, did, url, "Site", None, at).expect("site")
    }

    #[test]
    fn test_upsert_synced_twice_no_duplicates() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 10);
        let uri = "at://did:plc:a/net.ringlet.membership/1";

        upsert_synced(&conn, RING, site, uri, 10).expect("first");
        upsert_synced(&conn, RING, site, uri, 10).expect("second");

        assert_eq!(approved_count(&conn, RING).expect("count"), 1);
    }

    #[test]
    fn test_upsert_synced_preserves_suspension() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 10);
        let uri = "at://did:plc:a/net.ringlet.membership/1";

        upsert_synced(&conn, RING, site, uri, 10).expect("sync");
        set_status_for_actor(&conn, RING, "did:plc:a", "suspended").expect("suspend");
        upsert_synced(&conn, RING, site, uri, 10).expect("re-sync");

        let row = find_for_actor(&conn, RING, "did:plc:a")
            .expect("find")
            .expect("present");
        assert_eq!(row.status, "suspended");
    }

    #[test]
    fn test_insert_approved_idempotent() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 10);

        let first = insert_approved(&conn, RING, site, "at://did:plc:owner/net.ringlet.membership/x", 10)
            .expect("first");
        let second =
            insert_approved(&conn, RING, site, "at://did:plc:owner/net.ringlet.membership/y", 20)
                .expect("second");

        assert!(first);
        assert!(!second, "re-approval must not insert a duplicate");
        assert_eq!(approved_count(&conn, RING).expect("count"), 1);
    }

    #[test]
    fn test_traversal_order_is_join_order() {
        let conn = test_db();
        for (did, url, at) in [
            ("did:plc:a", "https://a.example", 1),
            ("did:plc:b", "https://b.example", 2),
            ("did:plc:c", "https://c.example", 3),
        ] {
            let site = member_site(&conn, did, url, at);
            let uri = format!("at://{did}/net.ringlet.membership/1");
            upsert_synced(&conn, RING, site, &uri, at).expect("sync");
        }

        let urls = approved_urls(&conn, RING).expect("urls");
        assert_eq!(
            urls,
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string(),
                "https://c.example".to_string(),
            ]
        );
    }

    #[test]
    fn test_suspended_member_leaves_traversal() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 1);
        upsert_synced(&conn, RING, site, "at://did:plc:a/net.ringlet.membership/1", 1)
            .expect("sync");

        set_status_for_actor(&conn, RING, "did:plc:a", "suspended").expect("suspend");
        assert!(approved_urls(&conn, RING).expect("urls").is_empty());

        set_status_for_actor(&conn, RING, "did:plc:a", "approved").expect("unsuspend");
        assert_eq!(approved_urls(&conn, RING).expect("urls").len(), 1);
    }

    #[test]
    fn test_delete_for_actor_idempotent() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 1);
        upsert_synced(&conn, RING, site, "at://did:plc:a/net.ringlet.membership/1", 1)
            .expect("sync");

        assert_eq!(delete_for_actor(&conn, RING, "did:plc:a").expect("kick"), 1);
        assert_eq!(delete_for_actor(&conn, RING, "did:plc:a").expect("re-kick"), 0);
    }

    #[test]
    fn test_set_widget() {
        let conn = test_db();
        let site = member_site(&conn, "did:plc:a", "https://a.example", 1);
        let uri = "at://did:plc:a/net.ringlet.membership/1";
        upsert_synced(&conn, RING, site, uri, 1).expect("sync");

        set_widget(&conn, uri, true, 99).expect("widget");
        let row = find_for_actor(&conn, RING, "did:plc:a")
            .expect("find")
            .expect("present");
        assert_eq!(row.widget_installed, Some(true));
        assert_eq!(row.last_verified_at, Some(99));
    }
}
