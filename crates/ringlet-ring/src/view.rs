//! The unified per-actor ring projection consumed by the dashboard.
//!
//! Three inputs merged in order: rings the actor owns remotely, memberships
//! the actor holds remotely, and the local ring cache. Read-only; tolerates
//! a cache that has not caught up (entries keep their placeholder title).

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::debug;

use ringlet_db::queries;
use ringlet_db::DbError;
use ringlet_pds::{PdsError, RepoStore};
use ringlet_types::{
    collections, parse_membership, parse_ring, AcceptancePolicy, AtUri, Did, RecordShape,
    RecruitmentStatus, RingSummary, PLACEHOLDER_TITLE,
};

/// View construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("remote repository: {0}")]
    Remote(#[from] PdsError),
}

fn placeholder(uri: AtUri) -> RingSummary {
    RingSummary {
        uri,
        title: PLACEHOLDER_TITLE.to_string(),
        description: None,
        slug: None,
        status: RecruitmentStatus::default(),
        policy: AcceptancePolicy::default(),
        is_admin: false,
        is_member: false,
        member_count: 0,
        pending_requests: 0,
        pending_members: 0,
        member_site_url: None,
        membership_uri: None,
    }
}

/// Build the actor's unified ring list.
///
/// Output order is merge insertion order: owned rings first, then
/// membership-only rings. Stable for a given input, not sorted by any
/// business key.
pub async fn unified_rings(
    store: &dyn RepoStore,
    conn: &mut Connection,
    did: &Did,
) -> Result<Vec<RingSummary>, ViewError> {
    let mut entries: Vec<RingSummary> = Vec::new();
    let mut by_uri: HashMap<String, usize> = HashMap::new();

    // Pass 1: owned rings.
    for record in store.list_records(did, collections::RING).await? {
        let mut entry = placeholder(record.uri.clone());
        entry.is_admin = true;
        if let Some(ring) = parse_ring(&record.value, 0).into_value() {
            entry.title = ring.title;
            entry.description = ring.description;
            entry.slug = ring.slug;
            entry.status = ring.status;
            entry.policy = ring.policy;
        }
        by_uri.insert(record.uri.to_string(), entries.len());
        entries.push(entry);
    }

    // Pass 2: memberships.
    for record in store.list_records(did, collections::MEMBERSHIP).await? {
        let membership = match parse_membership(&record.value, 0) {
            RecordShape::Valid(m) | RecordShape::Recovered(m) => m,
            RecordShape::Unrecoverable(reason) => {
                debug!(uri = %record.uri, reason, "membership skipped in view");
                continue;
            }
        };
        // Ring-space copies of other actors' memberships live in this
        // actor's repo when they own the ring; those are not the viewer's
        // own memberships.
        if membership.subject.as_ref().is_some_and(|s| s != did) {
            continue;
        }
        let key = membership.ring.to_string();
        match by_uri.get(&key) {
            Some(&index) => {
                entries[index].is_member = true;
                entries[index].member_site_url = Some(membership.site.url);
                entries[index].membership_uri = Some(record.uri.to_string());
            }
            // An owned ring is never re-inserted as a bare placeholder.
            None if membership.ring.authority() == did => continue,
            None => {
                let mut entry = placeholder(membership.ring.clone());
                entry.is_member = true;
                entry.member_site_url = Some(membership.site.url);
                entry.membership_uri = Some(record.uri.to_string());
                by_uri.insert(key, entries.len());
                entries.push(entry);
            }
        }
    }

    // Pass 3: local-cache overlay plus pending counts.
    for entry in &mut entries {
        let key = entry.uri.to_string();
        match queries::rings::get(conn, &key) {
            Ok(row) => {
                entry.title = row.title;
                entry.description = row.description;
                entry.slug = row.slug;
                if let Some(status) = RecruitmentStatus::parse(&row.status) {
                    entry.status = status;
                }
                if let Some(policy) = AcceptancePolicy::parse(&row.acceptance_policy) {
                    entry.policy = policy;
                }
                entry.member_count = queries::memberships::approved_count(conn, &key)?;
                if row.admin_did == did.as_str() || row.owner_did == did.as_str() {
                    entry.is_admin = true;
                }
            }
            Err(DbError::NotFound(_)) => {} // cache not caught up; keep placeholder
            Err(e) => return Err(e.into()),
        }
        entry.pending_requests = queries::join_requests::pending_count(conn, &key)?;
        entry.pending_members = queries::memberships::pending_count(conn, &key)?;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{create_ring, RingProfile};
    use crate::membership::join;
    use ringlet_pds::memory::MemoryRepo;
    use ringlet_types::SiteRef;

    const NOW: u64 = 1_700_000_000;

    fn did(s: &str) -> Did {
        s.parse().expect("did")
    }

    fn site(url: &str) -> SiteRef {
        SiteRef {
            url: url.to_string(),
            title: "Site".to_string(),
            rss: None,
        }
    }

    fn profile(title: &str, slug: &str, policy: AcceptancePolicy) -> RingProfile {
        RingProfile {
            title: title.to_string(),
            description: None,
            slug: Some(slug.to_string()),
            status: RecruitmentStatus::Open,
            policy,
            admin: None,
            banner: None,
        }
    }

    fn test_db() -> Connection {
        ringlet_db::open_memory().expect("open test db")
    }

    #[tokio::test]
    async fn test_owned_ring_is_admin() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        create_ring(&repo, &mut conn, &owner, &profile("Indie", "indie", AcceptancePolicy::Automatic), NOW)
            .await
            .expect("create");

        let view = unified_rings(&repo, &mut conn, &owner).await.expect("view");
        assert_eq!(view.len(), 1);
        assert!(view[0].is_admin);
        assert!(!view[0].is_member);
        assert_eq!(view[0].title, "Indie");
    }

    #[tokio::test]
    async fn test_membership_attaches_site_and_uri() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        let alice = did("did:plc:alice");
        let ring =
            create_ring(&repo, &mut conn, &owner, &profile("Indie", "indie", AcceptancePolicy::Automatic), NOW)
                .await
                .expect("create");
        join(&repo, &mut conn, &alice, &ring, &site("https://a.example"), None, NOW)
            .await
            .expect("join");

        let view = unified_rings(&repo, &mut conn, &alice).await.expect("view");
        assert_eq!(view.len(), 1);
        assert!(view[0].is_member);
        assert!(!view[0].is_admin);
        assert_eq!(view[0].member_site_url.as_deref(), Some("https://a.example"));
        assert!(view[0].membership_uri.is_some());
        assert_eq!(view[0].title, "Indie", "local cache overlays the placeholder");
        assert_eq!(view[0].member_count, 1);
    }

    #[tokio::test]
    async fn test_unsynced_ring_keeps_placeholder_title() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let alice = did("did:plc:alice");
        // A sidecar referencing a ring the local cache has never seen.
        repo.seed(
            &alice,
            collections::MEMBERSHIP,
            "m1",
            serde_json::json!({
                "ring": "at://did:plc:elsewhere/net.ringlet.ring/9z",
                "site": {"url": "https://a.example", "title": "A"},
                "createdAt": "2023-11-14T22:13:20Z",
            }),
        );

        let view = unified_rings(&repo, &mut conn, &alice).await.expect("view");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].title, PLACEHOLDER_TITLE);
        assert!(view[0].is_member);
    }

    #[tokio::test]
    async fn test_owned_ring_not_reinserted_from_membership() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        // Membership referencing the owner's own ring, but the owned-rings
        // pass saw nothing (record listing raced a delete, say).
        repo.seed(
            &owner,
            collections::MEMBERSHIP,
            "m1",
            serde_json::json!({
                "ring": format!("at://{}/net.ringlet.ring/gone", owner),
                "site": {"url": "https://o.example", "title": "O"},
                "createdAt": "2023-11-14T22:13:20Z",
            }),
        );

        let view = unified_rings(&repo, &mut conn, &owner).await.expect("view");
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_ring_space_copies_are_not_viewer_memberships() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        let ring =
            create_ring(&repo, &mut conn, &owner, &profile("Indie", "indie", AcceptancePolicy::Automatic), NOW)
                .await
                .expect("create");
        // Copy created on approval: lives in the owner's repo, names alice.
        repo.seed(
            &owner,
            collections::MEMBERSHIP,
            "copy1",
            serde_json::json!({
                "ring": ring.to_string(),
                "subject": "did:plc:alice",
                "site": {"url": "https://a.example", "title": "A"},
                "createdAt": "2023-11-14T22:13:20Z",
            }),
        );

        let view = unified_rings(&repo, &mut conn, &owner).await.expect("view");
        assert_eq!(view.len(), 1);
        assert!(view[0].is_admin);
        assert!(!view[0].is_member, "another actor's membership is not the owner's");
    }

    #[tokio::test]
    async fn test_delegated_admin_flag_from_cache() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        let helper = did("did:plc:helper");
        let mut p = profile("Indie", "indie", AcceptancePolicy::Automatic);
        p.admin = Some(helper.clone());
        let ring = create_ring(&repo, &mut conn, &owner, &p, NOW).await.expect("create");
        join(&repo, &mut conn, &helper, &ring, &site("https://h.example"), None, NOW)
            .await
            .expect("join");

        let view = unified_rings(&repo, &mut conn, &helper).await.expect("view");
        assert_eq!(view.len(), 1);
        assert!(view[0].is_admin, "delegated admin flagged via local cache");
        assert!(view[0].is_member);
    }

    #[tokio::test]
    async fn test_pending_counts_accumulated() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let owner = did("did:plc:owner");
        let ring =
            create_ring(&repo, &mut conn, &owner, &profile("Indie", "indie", AcceptancePolicy::Manual), NOW)
                .await
                .expect("create");
        join(&repo, &mut conn, &did("did:plc:alice"), &ring, &site("https://a.example"), None, NOW)
            .await
            .expect("alice");
        join(&repo, &mut conn, &did("did:plc:bob"), &ring, &site("https://b.example"), None, NOW)
            .await
            .expect("bob");

        let view = unified_rings(&repo, &mut conn, &owner).await.expect("view");
        assert_eq!(view[0].pending_requests, 2);
        assert_eq!(view[0].member_count, 0);
    }

    #[tokio::test]
    async fn test_owned_rings_precede_membership_rings() {
        let repo = MemoryRepo::new();
        let mut conn = test_db();
        let alice = did("did:plc:alice");
        let owner = did("did:plc:owner");
        let theirs =
            create_ring(&repo, &mut conn, &owner, &profile("Theirs", "theirs", AcceptancePolicy::Automatic), NOW)
                .await
                .expect("theirs");
        join(&repo, &mut conn, &alice, &theirs, &site("https://a.example"), None, NOW)
            .await
            .expect("join");
        let mine =
            create_ring(&repo, &mut conn, &alice, &profile("Mine", "mine", AcceptancePolicy::Automatic), NOW)
                .await
                .expect("mine");

        let view = unified_rings(&repo, &mut conn, &alice).await.expect("view");
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].uri, mine);
        assert_eq!(view[1].uri, theirs);
    }
}
