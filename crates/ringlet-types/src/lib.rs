//! # ringlet-types
//!
//! Shared domain types used across the Ringlet workspace: actor and record
//! identifiers, the remote record shapes written into actor repositories,
//! and the view types served to the dashboard.

pub mod record;
pub mod ring;
pub mod uri;

pub use record::{
    parse_block, parse_membership, parse_ring, recover_ring_uri, BlockRecord, CanonicalBlock,
    CanonicalMembership, CanonicalRing, JoinRequestRecord, MembershipRecord, RecordShape,
    RingRecord, SiteRef,
};
pub use ring::{AcceptancePolicy, MembershipStatus, RecruitmentStatus, RequestStatus, RingSummary};
pub use uri::{AtUri, Did, UriError};

/// Record collection NSIDs, one per remote-backed entity kind.
pub mod collections {
    /// A ring owned by an actor.
    pub const RING: &str = "net.ringlet.ring";
    /// A membership sidecar record, or the ring-space copy in the owner's repo.
    pub const MEMBERSHIP: &str = "net.ringlet.membership";
    /// A manual-acceptance join attempt awaiting decision.
    pub const JOIN_REQUEST: &str = "net.ringlet.joinRequest";
    /// A moderation block scoped to one ring.
    pub const BLOCK: &str = "net.ringlet.block";
}

/// Placeholder title for ring entries whose local cache row has not been
/// synced yet. The local-cache overlay replaces it once sync catches up.
pub const PLACEHOLDER_TITLE: &str = "loading";
