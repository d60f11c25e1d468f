//! The membership state machine.
//!
//! States per (ring, actor): none, pending, approved, suspended, blocked.
//! Every owner/admin transition re-verifies authorization against the local
//! ring row; capability presented by a client is never trusted. Transitions
//! are idempotent: re-applying one reports `AlreadyInState`.

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::{info, warn};

use ringlet_db::queries::{self, join_requests::RequestRow, rings::RingRow};
use ringlet_db::DbError;
use ringlet_pds::RepoStore;
use ringlet_types::{
    collections, AcceptancePolicy, AtUri, BlockRecord, Did, JoinRequestRecord, MembershipRecord,
    SiteRef,
};

use crate::{to_rfc3339, ModerationError, Result, TransitionOutcome};

/// Externally-provided widget verification, e.g. an HTML fetch-and-scan.
/// Consumed here; implemented elsewhere.
#[async_trait]
pub trait WidgetChecker: Send + Sync {
    async fn widget_installed(&self, site_url: &str) -> bool;
}

fn get_ring(conn: &Connection, ring_uri: &AtUri) -> Result<RingRow> {
    match queries::rings::get(conn, &ring_uri.to_string()) {
        Ok(ring) => Ok(ring),
        Err(DbError::NotFound(_)) => Err(ModerationError::RingNotFound),
        Err(e) => Err(e.into()),
    }
}

fn authorize(ring: &RingRow, acting: &Did) -> Result<()> {
    if ring.owner_did == acting.as_str() || ring.admin_did == acting.as_str() {
        Ok(())
    } else {
        Err(ModerationError::AuthorizationDenied)
    }
}

/// An actor joins a ring with one of their sites.
///
/// Blocked actors are rejected outright; closed rings accept no one. Under
/// the automatic policy the membership sidecar is written to the actor's
/// repository and the local row lands approved; under the manual policy a
/// join-request record is written instead and the local request row lands
/// pending. Joining while already a member or already pending is a no-op.
pub async fn join(
    store: &dyn RepoStore,
    conn: &mut Connection,
    actor: &Did,
    ring_uri: &AtUri,
    site: &SiteRef,
    message: Option<&str>,
    now: u64,
) -> Result<TransitionOutcome> {
    let ring = get_ring(conn, ring_uri)?;
    let ring_key = ring_uri.to_string();

    if queries::blocks::is_blocked(conn, &ring_key, actor.as_str())? {
        return Err(ModerationError::Blocked);
    }
    if queries::memberships::find_for_actor(conn, &ring_key, actor.as_str())?.is_some() {
        return Ok(TransitionOutcome::AlreadyInState);
    }
    if queries::join_requests::pending_for(conn, &ring_key, actor.as_str())?.is_some() {
        return Ok(TransitionOutcome::AlreadyInState);
    }
    if ring.status == "closed" {
        return Err(ModerationError::ConflictingState(
            "ring is closed to new members".into(),
        ));
    }

    let policy = AcceptancePolicy::parse(&ring.acceptance_policy).unwrap_or_default();
    match policy {
        AcceptancePolicy::Automatic => {
            let record = MembershipRecord {
                ring: ring_key.clone(),
                site: site.clone(),
                subject: None,
                created_at: to_rfc3339(now),
            };
            let uri = store
                .create_record(actor, collections::MEMBERSHIP, serde_json::to_value(&record)?)
                .await?;
            let site_id = queries::sites::ensure(
                conn,
                actor.as_str(),
                &site.url,
                &site.title,
                site.rss.as_deref(),
                now,
            )?;
            queries::memberships::insert_approved(conn, &ring_key, site_id, &uri.to_string(), now)?;
            info!(ring = %ring_key, did = %actor, "joined ring");
        }
        AcceptancePolicy::Manual => {
            let record = JoinRequestRecord {
                ring: ring_key.clone(),
                site: site.clone(),
                message: message.map(str::to_string),
                created_at: to_rfc3339(now),
            };
            let uri = store
                .create_record(actor, collections::JOIN_REQUEST, serde_json::to_value(&record)?)
                .await?;
            queries::join_requests::insert(
                conn,
                &ring_key,
                actor.as_str(),
                &site.url,
                &site.title,
                site.rss.as_deref(),
                message,
                Some(&uri.to_string()),
                now,
            )?;
            info!(ring = %ring_key, did = %actor, "join requested");
        }
    }
    Ok(TransitionOutcome::Applied)
}

fn decided_request(request: &RequestRow, target: &str) -> Option<Result<TransitionOutcome>> {
    match request.status.as_str() {
        s if s == target => Some(Ok(TransitionOutcome::AlreadyInState)),
        "pending" => None,
        other => Some(Err(ModerationError::ConflictingState(format!(
            "request already {other}"
        )))),
    }
}

/// Owner/admin approves a pending join request.
///
/// The ring-space membership copy (carrying the requester as subject) is
/// created in the ring owner's repository first; one local transaction then
/// marks the request approved, ensures the site row, and inserts the
/// membership. Exactly one request becomes exactly one membership.
pub async fn approve_request(
    store: &dyn RepoStore,
    conn: &mut Connection,
    acting: &Did,
    request_id: i64,
    now: u64,
) -> Result<TransitionOutcome> {
    let request = queries::join_requests::get(conn, request_id)?;
    let ring_uri: AtUri = request
        .ring_uri
        .parse()
        .map_err(|_| ModerationError::RingNotFound)?;
    let ring = get_ring(conn, &ring_uri)?;
    authorize(&ring, acting)?;
    if let Some(decided) = decided_request(&request, "approved") {
        return decided;
    }

    let owner: Did = ring
        .owner_did
        .parse()
        .map_err(|_| ModerationError::Db(DbError::Constraint("invalid owner did".into())))?;
    let record = MembershipRecord {
        ring: request.ring_uri.clone(),
        site: SiteRef {
            url: request.site_url.clone(),
            title: request.site_title.clone(),
            rss: request.rss_url.clone(),
        },
        subject: Some(request.user_did.clone()),
        created_at: to_rfc3339(now),
    };
    let member_uri = store
        .create_record(&owner, collections::MEMBERSHIP, serde_json::to_value(&record)?)
        .await?;

    let tx = conn.unchecked_transaction().map_err(DbError::Sqlite)?;
    queries::join_requests::set_status(&tx, request_id, "approved")?;
    let site_id = queries::sites::ensure(
        &tx,
        &request.user_did,
        &request.site_url,
        &request.site_title,
        request.rss_url.as_deref(),
        now,
    )?;
    queries::memberships::insert_approved(
        &tx,
        &request.ring_uri,
        site_id,
        &member_uri.to_string(),
        now,
    )?;
    tx.commit().map_err(DbError::Sqlite)?;

    info!(ring = %request.ring_uri, did = %request.user_did, "request approved");
    Ok(TransitionOutcome::Applied)
}

/// Owner/admin rejects a pending join request. No membership is created and
/// the requester's remote record is left alone (it lives in their repo).
pub fn reject_request(conn: &Connection, acting: &Did, request_id: i64) -> Result<TransitionOutcome> {
    let request = queries::join_requests::get(conn, request_id)?;
    let ring_uri: AtUri = request
        .ring_uri
        .parse()
        .map_err(|_| ModerationError::RingNotFound)?;
    let ring = get_ring(conn, &ring_uri)?;
    authorize(&ring, acting)?;
    if let Some(decided) = decided_request(&request, "rejected") {
        return decided;
    }

    queries::join_requests::set_status(conn, request_id, "rejected")?;
    info!(ring = %request.ring_uri, did = %request.user_did, "request rejected");
    Ok(TransitionOutcome::Applied)
}

fn toggle_status(
    conn: &Connection,
    acting: &Did,
    ring_uri: &AtUri,
    member: &Did,
    target: &str,
    expected: &str,
) -> Result<TransitionOutcome> {
    let ring = get_ring(conn, ring_uri)?;
    authorize(&ring, acting)?;
    let ring_key = ring_uri.to_string();

    let row = queries::memberships::find_for_actor(conn, &ring_key, member.as_str())?
        .ok_or_else(|| ModerationError::ConflictingState("no membership".into()))?;
    if row.status == target {
        return Ok(TransitionOutcome::AlreadyInState);
    }
    if row.status != expected {
        return Err(ModerationError::ConflictingState(format!(
            "membership is {}",
            row.status
        )));
    }
    queries::memberships::set_status_for_actor(conn, &ring_key, member.as_str(), target)?;
    info!(ring = %ring_key, did = %member, status = target, "membership status set");
    Ok(TransitionOutcome::Applied)
}

/// Hide a member from traversal without removing their record.
pub fn suspend(
    conn: &Connection,
    acting: &Did,
    ring_uri: &AtUri,
    member: &Did,
) -> Result<TransitionOutcome> {
    toggle_status(conn, acting, ring_uri, member, "suspended", "approved")
}

/// Restore a suspended member to traversal.
pub fn unsuspend(
    conn: &Connection,
    acting: &Did,
    ring_uri: &AtUri,
    member: &Did,
) -> Result<TransitionOutcome> {
    toggle_status(conn, acting, ring_uri, member, "approved", "suspended")
}

/// Self-service departure. Deletes the actor's own remote records (membership
/// sidecar and any pending join request), then the local rows; the remote
/// deletes go first so a failure leaves the local state untouched.
pub async fn leave(
    store: &dyn RepoStore,
    conn: &mut Connection,
    actor: &Did,
    ring_uri: &AtUri,
) -> Result<TransitionOutcome> {
    let ring_key = ring_uri.to_string();
    let membership = queries::memberships::find_for_actor(conn, &ring_key, actor.as_str())?;
    let request = queries::join_requests::pending_for(conn, &ring_key, actor.as_str())?;
    if membership.is_none() && request.is_none() {
        return Ok(TransitionOutcome::AlreadyInState);
    }

    if let Some(uri) = membership.as_ref().and_then(|m| m.member_uri.as_deref()) {
        delete_own_record(store, actor, uri).await?;
    }
    if let Some(uri) = request.as_ref().and_then(|r| r.atproto_uri.as_deref()) {
        delete_own_record(store, actor, uri).await?;
    }

    queries::memberships::delete_for_actor(conn, &ring_key, actor.as_str())?;
    queries::join_requests::delete_pending_for_actor(conn, &ring_key, actor.as_str())?;
    info!(ring = %ring_key, did = %actor, "left ring");
    Ok(TransitionOutcome::Applied)
}

/// Delete a remote record only when it actually lives in the actor's own
/// repository. A row derived from a ring-space copy points into the ring
/// owner's repo, which this actor has no authority over.
async fn delete_own_record(store: &dyn RepoStore, actor: &Did, uri: &str) -> Result<()> {
    if let Ok(parsed) = uri.parse::<AtUri>() {
        if parsed.authority() == actor {
            store.delete_record(&parsed).await?;
        }
    }
    Ok(())
}

/// Owner/admin removes a member from the local index. The member's own
/// remote record is untouched: a moderator cannot write another actor's
/// repository, so a kick is a local denial resolved visually, not a remote
/// mutation. Re-kicking an absent member is a no-op.
pub fn kick(
    conn: &Connection,
    acting: &Did,
    ring_uri: &AtUri,
    member: &Did,
) -> Result<TransitionOutcome> {
    let ring = get_ring(conn, ring_uri)?;
    authorize(&ring, acting)?;
    let deleted =
        queries::memberships::delete_for_actor(conn, &ring_uri.to_string(), member.as_str())?;
    if deleted == 0 {
        return Ok(TransitionOutcome::AlreadyInState);
    }
    info!(ring = %ring_uri, did = %member, "member kicked");
    Ok(TransitionOutcome::Applied)
}

/// Owner/admin blocks an actor from a ring.
///
/// The remote block record is created first; one local transaction then
/// inserts the block row and removes any membership and pending request for
/// the subject. A local failure after the successful remote write is a known
/// inconsistency repaired by the next sync pass, logged rather than surfaced.
pub async fn block_actor(
    store: &dyn RepoStore,
    conn: &mut Connection,
    acting: &Did,
    ring_uri: &AtUri,
    subject: &Did,
    reason: Option<&str>,
    now: u64,
) -> Result<TransitionOutcome> {
    let ring = get_ring(conn, ring_uri)?;
    authorize(&ring, acting)?;
    let ring_key = ring_uri.to_string();

    if queries::blocks::is_blocked(conn, &ring_key, subject.as_str())? {
        return Ok(TransitionOutcome::AlreadyInState);
    }

    let record = BlockRecord {
        ring: ring_key.clone(),
        subject: subject.to_string(),
        reason: reason.map(str::to_string),
        created_at: Some(to_rfc3339(now)),
    };
    let uri = store
        .create_record(acting, collections::BLOCK, serde_json::to_value(&record)?)
        .await?;

    let applied = || -> ringlet_db::Result<()> {
        let tx = conn.unchecked_transaction()?;
        queries::blocks::upsert(
            &tx,
            &uri.to_string(),
            &ring_key,
            subject.as_str(),
            reason,
            Some(now),
        )?;
        queries::memberships::delete_for_actor(&tx, &ring_key, subject.as_str())?;
        queries::join_requests::delete_pending_for_actor(&tx, &ring_key, subject.as_str())?;
        tx.commit()?;
        Ok(())
    }();
    if let Err(e) = applied {
        warn!(
            ring = %ring_key,
            did = %subject,
            error = %e,
            "local rows inconsistent after remote block write; next sync repairs"
        );
    }

    info!(ring = %ring_key, did = %subject, "actor blocked");
    Ok(TransitionOutcome::Applied)
}

/// Store the outcome of a widget-verification check on a membership row.
pub fn record_widget_check(
    conn: &Connection,
    member_uri: &str,
    installed: bool,
    now: u64,
) -> Result<()> {
    queries::memberships::set_widget(conn, member_uri, installed, now)?;
    Ok(())
}

/// Run a widget check against a member's site and store the outcome.
/// Returns the check result. `ConflictingState` when the actor holds no
/// membership in the ring.
pub async fn verify_widget(
    checker: &dyn WidgetChecker,
    conn: &mut Connection,
    ring_uri: &AtUri,
    member: &Did,
    now: u64,
) -> Result<bool> {
    let row = queries::memberships::find_for_actor(conn, &ring_uri.to_string(), member.as_str())?
        .ok_or_else(|| ModerationError::ConflictingState("no membership".into()))?;
    let member_uri = row
        .member_uri
        .ok_or_else(|| ModerationError::ConflictingState("membership has no record uri".into()))?;
    let site = queries::sites::get(conn, row.site_id)?;

    let installed = checker.widget_installed(&site.url).await;
    queries::memberships::set_widget(conn, &member_uri, installed, now)?;
    info!(ring = %ring_uri, did = %member, installed, "widget check recorded");
    Ok(installed)
}
