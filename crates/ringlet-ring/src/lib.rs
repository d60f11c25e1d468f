//! # ringlet-ring
//!
//! Ring domain services on top of the local index and the remote
//! repositories: membership moderation, ring administration, the unified
//! dashboard view, and ring navigation.
//!
//! Write paths follow remote-first ordering: the unforgeable remote record is
//! created before the local rows it implies, so a crash between the two
//! leaves a gap the next sync pass closes rather than a forged local fact.

pub mod admin;
pub mod membership;
pub mod navigation;
pub mod view;

pub use admin::{create_ring, delete_ring, update_ring, RingProfile};
pub use membership::{
    approve_request, block_actor, join, kick, leave, record_widget_check, reject_request,
    suspend, unsuspend, verify_widget, WidgetChecker,
};
pub use navigation::{next_site, prev_site, random_site};
pub use view::{unified_rings, ViewError};

use ringlet_db::DbError;
use ringlet_pds::PdsError;

/// Moderation and admin errors.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// The acting actor is neither owner nor admin of the ring.
    #[error("authorization denied")]
    AuthorizationDenied,

    /// The subject actor is blocked from the ring.
    #[error("actor is blocked from this ring")]
    Blocked,

    /// The ring is unknown to the local index.
    #[error("ring not found")]
    RingNotFound,

    /// The requested transition contradicts the current state
    /// (e.g. approving a rejected request, joining a closed ring).
    #[error("conflicting state: {0}")]
    ConflictingState(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("remote repository: {0}")]
    Remote(#[from] PdsError),

    #[error("encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModerationError>;

/// Outcome of a state-machine transition. Idempotent re-application of a
/// transition reports [`AlreadyInState`](TransitionOutcome::AlreadyInState)
/// instead of failing, so racing moderators cannot corrupt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    AlreadyInState,
}

/// Unix seconds to the RFC 3339 form stored in remote records.
pub(crate) fn to_rfc3339(now: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(now as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}
