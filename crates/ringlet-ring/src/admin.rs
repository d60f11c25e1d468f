//! Ring administration: create, update, delete.

use rusqlite::Connection;
use tracing::{info, warn};

use ringlet_db::queries::{self, rings::RingUpsert};
use ringlet_db::DbError;
use ringlet_pds::RepoStore;
use ringlet_types::{
    collections, recover_ring_uri, AcceptancePolicy, AtUri, Did, RecruitmentStatus, RingRecord,
};

use crate::{to_rfc3339, ModerationError, Result};

/// Owner/admin-editable ring fields.
#[derive(Debug, Clone)]
pub struct RingProfile {
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub status: RecruitmentStatus,
    pub policy: AcceptancePolicy,
    /// Delegated admin; defaults to the owner.
    pub admin: Option<Did>,
    pub banner: Option<String>,
}

impl RingProfile {
    fn to_record(&self, created_at: &str) -> RingRecord {
        RingRecord {
            title: self.title.clone(),
            description: self.description.clone(),
            slug: self.slug.clone(),
            status: self.status,
            policy: self.policy,
            admin: self.admin.as_ref().map(|d| d.to_string()),
            banner: self.banner.clone(),
            created_at: created_at.to_string(),
        }
    }

    fn to_upsert<'a>(&'a self, uri: &'a str, owner: &'a Did, created_at: u64) -> RingUpsert<'a> {
        RingUpsert {
            uri,
            owner_did: owner.as_str(),
            admin_did: self.admin.as_ref().map(Did::as_str).unwrap_or(owner.as_str()),
            title: &self.title,
            slug: self.slug.as_deref(),
            description: self.description.as_deref(),
            acceptance_policy: self.policy.as_str(),
            status: self.status.as_str(),
            banner_url: self.banner.as_deref(),
            created_at,
        }
    }
}

/// Create a ring: remote record in the owner's repository, then the local
/// cache row. Slug uniqueness is enforced by the local index.
pub async fn create_ring(
    store: &dyn RepoStore,
    conn: &mut Connection,
    owner: &Did,
    profile: &RingProfile,
    now: u64,
) -> Result<AtUri> {
    let record = profile.to_record(&to_rfc3339(now));
    let uri = store
        .create_record(owner, collections::RING, serde_json::to_value(&record)?)
        .await?;

    let uri_string = uri.to_string();
    if let Err(e) = queries::rings::upsert(conn, &profile.to_upsert(&uri_string, owner, now)) {
        warn!(uri = %uri, error = %e, "local row missing after remote ring create; next sync repairs");
        return Err(e.into());
    }
    info!(uri = %uri, did = %owner, "ring created");
    Ok(uri)
}

/// Update a ring's profile. Owner or admin only; the remote record is
/// rewritten in place, then the local row.
pub async fn update_ring(
    store: &dyn RepoStore,
    conn: &mut Connection,
    acting: &Did,
    uri: &AtUri,
    profile: &RingProfile,
) -> Result<()> {
    let ring = get_ring(conn, uri)?;
    if ring.owner_did != acting.as_str() && ring.admin_did != acting.as_str() {
        return Err(ModerationError::AuthorizationDenied);
    }

    let record = profile.to_record(&to_rfc3339(ring.created_at));
    store.put_record(uri, serde_json::to_value(&record)?).await?;

    let uri_string = uri.to_string();
    let owner: Did = ring
        .owner_did
        .parse()
        .map_err(|_| ModerationError::Db(DbError::Constraint("invalid owner did".into())))?;
    queries::rings::update_profile(conn, &profile.to_upsert(&uri_string, &owner, ring.created_at))?;
    info!(uri = %uri, did = %acting, "ring updated");
    Ok(())
}

/// Delete a ring. Owner only.
///
/// Remote side first: the ring record itself, then the owner's ring-scoped
/// records (ring-space membership copies and block records). The scoped
/// sweeps are best-effort; orphans in the owner's repo reference a ring that
/// no longer exists and are skipped by view and sync. Local side is one
/// cascade: ring row, memberships, join requests, block rows.
pub async fn delete_ring(
    store: &dyn RepoStore,
    conn: &mut Connection,
    acting: &Did,
    uri: &AtUri,
) -> Result<()> {
    let ring = get_ring(conn, uri)?;
    if ring.owner_did != acting.as_str() {
        return Err(ModerationError::AuthorizationDenied);
    }

    store.delete_record(uri).await?;
    for collection in [collections::MEMBERSHIP, collections::BLOCK] {
        sweep_ring_scoped(store, acting, collection, uri).await;
    }

    queries::rings::delete_cascade(conn, &uri.to_string())?;
    info!(uri = %uri, did = %acting, "ring deleted");
    Ok(())
}

/// Delete the owner's records of one kind that reference the given ring.
async fn sweep_ring_scoped(store: &dyn RepoStore, owner: &Did, collection: &str, ring: &AtUri) {
    let records = match store.list_records(owner, collection).await {
        Ok(records) => records,
        Err(e) => {
            warn!(did = %owner, collection, error = %e, "ring-scoped sweep listing failed");
            return;
        }
    };
    for record in records {
        let references_ring = record
            .value
            .get("ring")
            .and_then(|v| v.as_str())
            .and_then(recover_ring_uri)
            .is_some_and(|parsed| &parsed == ring);
        if !references_ring {
            continue;
        }
        if let Err(e) = store.delete_record(&record.uri).await {
            warn!(uri = %record.uri, error = %e, "ring-scoped sweep delete failed");
        }
    }
}

fn get_ring(conn: &Connection, uri: &AtUri) -> Result<queries::rings::RingRow> {
    match queries::rings::get(conn, &uri.to_string()) {
        Ok(ring) => Ok(ring),
        Err(DbError::NotFound(_)) => Err(ModerationError::RingNotFound),
        Err(e) => Err(e.into()),
    }
}
