//! Ring cache queries.
//!
//! Rows are keyed by the ring's canonical URI and derived from the owner's
//! remote repository. Upserts never overwrite a locally-present nullable
//! field with a remote null.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Fields written by a sync or create upsert.
#[derive(Debug, Clone)]
pub struct RingUpsert<'a> {
    pub uri: &'a str,
    pub owner_did: &'a str,
    pub admin_did: &'a str,
    pub title: &'a str,
    pub slug: Option<&'a str>,
    pub description: Option<&'a str>,
    pub acceptance_policy: &'a str,
    pub status: &'a str,
    pub banner_url: Option<&'a str>,
    pub created_at: u64,
}

/// Upsert a ring keyed by URI.
pub fn upsert(conn: &Connection, ring: &RingUpsert<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO rings (uri, owner_did, admin_did, title, slug, description,
                            acceptance_policy, status, banner_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(uri) DO UPDATE SET
             owner_did = excluded.owner_did,
             admin_did = excluded.admin_did,
             title = excluded.title,
             slug = COALESCE(excluded.slug, slug),
             description = COALESCE(excluded.description, description),
             acceptance_policy = excluded.acceptance_policy,
             status = excluded.status,
             banner_url = COALESCE(excluded.banner_url, banner_url),
             created_at = excluded.created_at",
        rusqlite::params![
            ring.uri,
            ring.owner_did,
            ring.admin_did,
            ring.title,
            ring.slug,
            ring.description,
            ring.acceptance_policy,
            ring.status,
            ring.banner_url,
            ring.created_at as i64,
        ],
    )?;
    Ok(())
}

/// Insert a placeholder row for a ring referenced by a membership but not
/// yet fetched. Owner is inferred from the URI's embedded actor; a later
/// sync of the real record overwrites it via [`upsert`].
pub fn insert_stub(
    conn: &Connection,
    uri: &str,
    owner_did: &str,
    title: &str,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO rings (uri, owner_did, admin_did, title, created_at)
         VALUES (?1, ?2, ?2, ?3, ?4)",
        rusqlite::params![uri, owner_did, title, now as i64],
    )?;
    Ok(())
}

/// Get a ring by URI.
pub fn get(conn: &Connection, uri: &str) -> Result<RingRow> {
    conn.query_row(
        "SELECT uri, owner_did, admin_did, title, slug, description,
                acceptance_policy, status, banner_url, created_at
         FROM rings WHERE uri = ?1",
        [uri],
        row_to_ring,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("ring".into()),
        other => DbError::Sqlite(other),
    })
}

/// Check whether a ring row exists.
pub fn exists(conn: &Connection, uri: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rings WHERE uri = ?1",
        [uri],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// List rings owned by an actor.
pub fn list_by_owner(conn: &Connection, owner_did: &str) -> Result<Vec<RingRow>> {
    let mut stmt = conn.prepare(
        "SELECT uri, owner_did, admin_did, title, slug, description,
                acceptance_policy, status, banner_url, created_at
         FROM rings WHERE owner_did = ?1 ORDER BY created_at, uri",
    )?;
    let rows = stmt
        .query_map([owner_did], row_to_ring)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Update the owner/admin-editable profile fields of a ring.
pub fn update_profile(conn: &Connection, ring: &RingUpsert<'_>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE rings SET admin_did = ?2, title = ?3, slug = ?4, description = ?5,
                          acceptance_policy = ?6, status = ?7, banner_url = ?8
         WHERE uri = ?1",
        rusqlite::params![
            ring.uri,
            ring.admin_did,
            ring.title,
            ring.slug,
            ring.description,
            ring.acceptance_policy,
            ring.status,
            ring.banner_url,
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("ring".into()));
    }
    Ok(())
}

/// Delete a ring and everything scoped to it, in one transaction.
///
/// Memberships and join requests cascade through foreign keys; block rows
/// carry no foreign key and are purged explicitly.
pub fn delete_cascade(conn: &Connection, uri: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM block_records WHERE ring_uri = ?1", [uri])?;
    tx.execute("DELETE FROM rings WHERE uri = ?1", [uri])?;
    tx.commit()?;
    Ok(())
}

fn row_to_ring(row: &rusqlite::Row<'_>) -> rusqlite::Result<RingRow> {
    Ok(RingRow {
        uri: row.get(0)?,
        owner_did: row.get(1)?,
        admin_did: row.get(2)?,
        title: row.get(3)?,
        slug: row.get(4)?,
        description: row.get(5)?,
        acceptance_policy: row.get(6)?,
        status: row.get(7)?,
        banner_url: row.get(8)?,
        created_at: row.get::<_, i64>(9)? as u64,
    })
}

/// A raw ring row from the database.
#[derive(Debug, Clone)]
pub struct RingRow {
    pub uri: String,
    pub owner_did: String,
    pub admin_did: String,
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub acceptance_policy: String,
    pub status: String,
    pub banner_url: Option<String>,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn sample<'a>(uri: &'a str, owner: &'a str) -> RingUpsert<'a> {
        RingUpsert {
            uri,
            owner_did: owner,
            admin_did: owner,
            title: "Indie Circle",
            slug: Some("indie"),
            description: Some("small web sites"),
            acceptance_policy: "manual",
            status: "open",
            banner_url: None,
            created_at: 1000,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = test_db();
        let uri = "at://did:plc:owner/net.ringlet.ring/1";
        upsert(&conn, &sample(uri, "did:plc:owner")).expect("upsert");

        let ring = get(&conn, uri).expect("get");
        assert_eq!(ring.title, "Indie Circle");
        assert_eq!(ring.slug.as_deref(), Some("indie"));
        assert_eq!(ring.acceptance_policy, "manual");
    }

    #[test]
    fn test_upsert_null_does_not_clobber() {
        let conn = test_db();
        let uri = "at://did:plc:owner/net.ringlet.ring/1";
        upsert(&conn, &sample(uri, "did:plc:owner")).expect("first");

        // Remote shape without slug/description must not erase local values.
        let mut second = sample(uri, "did:plc:owner");
        second.slug = None;
        second.description = None;
        second.title = "Indie Circle v2";
        upsert(&conn, &second).expect("second");

        let ring = get(&conn, uri).expect("get");
        assert_eq!(ring.title, "Indie Circle v2");
        assert_eq!(ring.slug.as_deref(), Some("indie"));
        assert_eq!(ring.description.as_deref(), Some("small web sites"));
    }

    #[test]
    fn test_stub_then_real_record() {
        let conn = test_db();
        let uri = "at://did:plc:owner/net.ringlet.ring/1";
        insert_stub(&conn, uri, "did:plc:owner", "loading", 500).expect("stub");

        let stub = get(&conn, uri).expect("get stub");
        assert_eq!(stub.title, "loading");
        assert_eq!(stub.admin_did, "did:plc:owner");

        upsert(&conn, &sample(uri, "did:plc:owner")).expect("real");
        let ring = get(&conn, uri).expect("get real");
        assert_eq!(ring.title, "Indie Circle");
    }

    #[test]
    fn test_slug_unique() {
        let conn = test_db();
        upsert(&conn, &sample("at://did:plc:a/net.ringlet.ring/1", "did:plc:a")).expect("first");
        let dup = sample("at://did:plc:b/net.ringlet.ring/1", "did:plc:b");
        assert!(upsert(&conn, &dup).is_err(), "duplicate slug must fail");
    }

    #[test]
    fn test_delete_cascade_removes_scoped_rows() {
        let conn = test_db();
        let uri = "at://did:plc:owner/net.ringlet.ring/1";
        upsert(&conn, &sample(uri, "did:plc:owner")).expect("upsert");

        let site_id =
            crate::queries::sites::ensure(&conn, "did:plc:member", "https://m.example", "M", None, 100)
                .expect("site");
        crate::queries::memberships::upsert_synced(
            &conn,
            uri,
            site_id,
            "at://did:plc:member/net.ringlet.membership/1",
            100,
        )
        .expect("membership");
        crate::queries::blocks::upsert(
            &conn,
            "at://did:plc:owner/net.ringlet.block/1",
            uri,
            "did:plc:spammer",
            None,
            Some(100),
        )
        .expect("block");

        delete_cascade(&conn, uri).expect("delete");

        assert!(matches!(get(&conn, uri), Err(DbError::NotFound(_))));
        let members = crate::queries::memberships::approved_urls(&conn, uri).expect("urls");
        assert!(members.is_empty());
        assert!(!crate::queries::blocks::is_blocked(&conn, uri, "did:plc:spammer").expect("blocked"));
    }
}
