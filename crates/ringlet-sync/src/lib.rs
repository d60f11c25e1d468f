//! # ringlet-sync
//!
//! Pulls records out of actor repositories and folds them into the local
//! index. The remote side is always authoritative for record content; the
//! local side owns moderation status and is rebuilt, never trusted.
//!
//! One sync pass per actor, three record kinds, each kind fault-isolated:
//! a failure syncing one kind is logged into the report and the next kind
//! still runs.

pub mod engine;
pub mod throttle;

use serde::Serialize;

pub use engine::{remove_actor, sync_actor, sync_all_users};
pub use throttle::SyncThrottle;

/// Sync errors. Only local index faults abort a pass; remote faults are
/// demoted to report entries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] ringlet_db::DbError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Outcome of one sync pass over one actor's repository.
#[derive(Debug, Clone, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct SyncReport {
    pub did: String,
    pub rings_synced: u32,
    pub memberships_synced: u32,
    pub blocks_synced: u32,
    /// Per-record and per-step failures, in encounter order.
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(did: &str) -> Self {
        Self {
            did: did.to_string(),
            rings_synced: 0,
            memberships_synced: 0,
            blocks_synced: 0,
            errors: Vec::new(),
        }
    }

    /// True when every record listed was ingested cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
