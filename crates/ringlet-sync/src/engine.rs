//! The sync pass: list, parse, upsert.
//!
//! Parse happens exactly once per record at ingestion; rows are keyed by the
//! record's remote URI so repeated passes converge instead of duplicating.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use ringlet_db::queries;
use ringlet_db::queries::rings::RingUpsert;
use ringlet_pds::RepoStore;
use ringlet_types::{
    collections, parse_block, parse_membership, parse_ring, AtUri, CanonicalRing, Did,
    RecordShape, PLACEHOLDER_TITLE,
};

use crate::{Result, SyncReport};

/// Sync one actor's repository into the local index.
///
/// Each record kind is fault-isolated: remote listing failures, unparseable
/// records, and row-level constraint violations become entries in the
/// report's error log, and the pass continues. Only a local index fault
/// aborts the pass.
pub async fn sync_actor(
    store: &dyn RepoStore,
    conn: &mut Connection,
    did: &Did,
    now: u64,
) -> Result<SyncReport> {
    let mut report = SyncReport::new(did.as_str());

    sync_rings(store, conn, did, now, &mut report).await?;
    sync_memberships(store, conn, did, now, &mut report).await?;
    sync_blocks(store, conn, did, &mut report).await?;

    queries::users::touch_synced(conn, did.as_str(), now)?;
    info!(
        did = %did,
        rings = report.rings_synced,
        memberships = report.memberships_synced,
        blocks = report.blocks_synced,
        errors = report.errors.len(),
        "sync pass complete"
    );
    Ok(report)
}

/// Sync every registered actor, oldest registration first.
///
/// A hard failure on one actor becomes a report with an error entry; it never
/// stops the remaining actors from syncing.
pub async fn sync_all_users(
    store: &dyn RepoStore,
    conn: &mut Connection,
    now: u64,
) -> Result<Vec<SyncReport>> {
    let users = queries::users::list(conn)?;
    let mut reports = Vec::with_capacity(users.len());

    for user in users {
        let did = match user.did.parse::<Did>() {
            Ok(did) => did,
            Err(e) => {
                let mut report = SyncReport::new(&user.did);
                report.errors.push(format!("invalid registered did: {e}"));
                reports.push(report);
                continue;
            }
        };
        match sync_actor(store, conn, &did, now).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(did = %did, error = %e, "sync pass aborted");
                let mut report = SyncReport::new(did.as_str());
                report.errors.push(format!("sync aborted: {e}"));
                reports.push(report);
            }
        }
    }
    Ok(reports)
}

async fn sync_rings(
    store: &dyn RepoStore,
    conn: &mut Connection,
    did: &Did,
    now: u64,
    report: &mut SyncReport,
) -> Result<()> {
    let records = match store.list_records(did, collections::RING).await {
        Ok(records) => records,
        Err(e) => {
            report.errors.push(format!("rings: {e}"));
            return Ok(());
        }
    };
    for record in records {
        let ring = match parse_ring(&record.value, now) {
            RecordShape::Valid(r) | RecordShape::Recovered(r) => r,
            RecordShape::Unrecoverable(reason) => {
                report.errors.push(format!("{}: {reason}", record.uri));
                continue;
            }
        };
        match upsert_ring_row(conn, &record.uri, &ring) {
            Ok(()) => report.rings_synced += 1,
            Err(e) => report.errors.push(format!("{}: {e}", record.uri)),
        }
    }
    Ok(())
}

async fn sync_memberships(
    store: &dyn RepoStore,
    conn: &mut Connection,
    did: &Did,
    now: u64,
    report: &mut SyncReport,
) -> Result<()> {
    let records = match store.list_records(did, collections::MEMBERSHIP).await {
        Ok(records) => records,
        Err(e) => {
            report.errors.push(format!("memberships: {e}"));
            return Ok(());
        }
    };
    for record in records {
        let membership = match parse_membership(&record.value, now) {
            RecordShape::Valid(m) => m,
            RecordShape::Recovered(m) => {
                debug!(uri = %record.uri, "recovered legacy ring reference");
                m
            }
            RecordShape::Unrecoverable(reason) => {
                report.errors.push(format!("{}: {reason}", record.uri));
                continue;
            }
        };

        // Ring-space copies carry the member's did; sidecars are owned by
        // the member themselves.
        let member = membership.subject.as_ref().unwrap_or(did);
        let ring_uri = membership.ring.to_string();

        if !queries::rings::exists(conn, &ring_uri)? {
            resolve_referenced_ring(store, conn, &membership.ring, now, report).await?;
        }

        let site_id = match queries::sites::ensure(
            conn,
            member.as_str(),
            &membership.site.url,
            &membership.site.title,
            membership.site.rss.as_deref(),
            membership.created_at,
        ) {
            Ok(id) => id,
            Err(e) => {
                report.errors.push(format!("{}: {e}", record.uri));
                continue;
            }
        };
        let member_uri = record.uri.to_string();
        match queries::memberships::upsert_synced(
            conn,
            &ring_uri,
            site_id,
            &member_uri,
            membership.created_at,
        ) {
            Ok(()) => report.memberships_synced += 1,
            Err(e) => report.errors.push(format!("{member_uri}: {e}")),
        }
    }
    Ok(())
}

async fn sync_blocks(
    store: &dyn RepoStore,
    conn: &mut Connection,
    did: &Did,
    report: &mut SyncReport,
) -> Result<()> {
    let records = match store.list_records(did, collections::BLOCK).await {
        Ok(records) => records,
        Err(e) => {
            report.errors.push(format!("blocks: {e}"));
            return Ok(());
        }
    };
    for record in records {
        let block = match parse_block(&record.value) {
            RecordShape::Valid(b) | RecordShape::Recovered(b) => b,
            RecordShape::Unrecoverable(reason) => {
                report.errors.push(format!("{}: {reason}", record.uri));
                continue;
            }
        };
        let uri = record.uri.to_string();
        match queries::blocks::upsert(
            conn,
            &uri,
            &block.ring.to_string(),
            block.subject.as_str(),
            block.reason.as_deref(),
            block.created_at,
        ) {
            Ok(()) => report.blocks_synced += 1,
            Err(e) => report.errors.push(format!("{uri}: {e}")),
        }
    }
    Ok(())
}

/// A membership referenced a ring the index has never seen. Fetch the ring
/// record once; failing that, insert a placeholder row (owner inferred from
/// the URI authority) so the membership still lands, and log the gap.
async fn resolve_referenced_ring(
    store: &dyn RepoStore,
    conn: &mut Connection,
    ring: &AtUri,
    now: u64,
    report: &mut SyncReport,
) -> Result<()> {
    match store.get_record(ring).await {
        Ok(Some(record)) => match parse_ring(&record.value, now) {
            RecordShape::Valid(r) | RecordShape::Recovered(r) => {
                match upsert_ring_row(conn, ring, &r) {
                    Ok(()) => return Ok(()),
                    Err(e) => report.errors.push(format!("{ring}: {e}")),
                }
            }
            RecordShape::Unrecoverable(reason) => {
                report.errors.push(format!("{ring}: {reason}"));
            }
        },
        Ok(None) => report.errors.push(format!("{ring}: referenced ring record missing")),
        Err(e) => report.errors.push(format!("{ring}: referenced ring unreachable: {e}")),
    }
    queries::rings::insert_stub(
        conn,
        &ring.to_string(),
        ring.authority().as_str(),
        PLACEHOLDER_TITLE,
        now,
    )?;
    Ok(())
}

fn upsert_ring_row(
    conn: &Connection,
    uri: &AtUri,
    ring: &CanonicalRing,
) -> ringlet_db::Result<()> {
    let uri_string = uri.to_string();
    let owner = uri.authority().as_str();
    let admin = ring.admin.as_ref().map(Did::as_str).unwrap_or(owner);
    queries::rings::upsert(
        conn,
        &RingUpsert {
            uri: &uri_string,
            owner_did: owner,
            admin_did: admin,
            title: &ring.title,
            slug: ring.slug.as_deref(),
            description: ring.description.as_deref(),
            acceptance_policy: ring.policy.as_str(),
            status: ring.status.as_str(),
            banner_url: ring.banner.as_deref(),
            created_at: ring.created_at,
        },
    )
}

/// Account-deletion teardown.
///
/// Remote wipe runs first and tolerates failures: a dead repository host
/// must not wedge local teardown. Local rows go in dependency order, sites
/// last among the actor-owned tables because memberships point at them.
pub async fn remove_actor(store: &dyn RepoStore, conn: &mut Connection, did: &Did) -> Result<()> {
    for collection in [
        collections::RING,
        collections::MEMBERSHIP,
        collections::JOIN_REQUEST,
        collections::BLOCK,
    ] {
        match store.list_records(did, collection).await {
            Ok(records) => {
                for record in records {
                    if let Err(e) = store.delete_record(&record.uri).await {
                        warn!(did = %did, uri = %record.uri, error = %e, "remote delete failed during teardown");
                    }
                }
            }
            Err(e) => {
                warn!(did = %did, collection, error = %e, "remote listing failed during teardown");
            }
        }
    }

    for ring in queries::rings::list_by_owner(conn, did.as_str())? {
        queries::rings::delete_cascade(conn, &ring.uri)?;
    }
    queries::memberships::delete_by_user(conn, did.as_str())?;
    queries::join_requests::delete_by_user(conn, did.as_str())?;
    queries::blocks::delete_authored_by(conn, did.as_str())?;
    queries::sites::remove_for_user(conn, did.as_str())?;
    queries::users::remove(conn, did.as_str())?;

    info!(did = %did, "actor removed");
    Ok(())
}
