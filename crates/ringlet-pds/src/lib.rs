//! # ringlet-pds
//!
//! Typed operations against a single actor's remote record repository.
//! Pure protocol adapter: no local state beyond the HTTP client itself.
//!
//! The [`RepoStore`] trait is the seam the sync and moderation services
//! depend on; [`client::PdsClient`] is the wire implementation, and
//! `memory::MemoryRepo` (behind the `test_utils` feature) is the in-process
//! fake used by tests.

pub mod client;
#[cfg(any(test, feature = "test_utils"))]
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use ringlet_types::{AtUri, Did};

pub use client::{PdsClient, PdsConfig};

/// Remote repository errors.
#[derive(Debug, thiserror::Error)]
pub enum PdsError {
    /// Network failure talking to the repository host.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// The bounded request timeout elapsed.
    #[error("repository request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("repository returned status {0}")]
    Status(u16),

    /// The record or repository does not exist.
    #[error("record not found")]
    NotFound,

    /// The response body did not match the expected shape.
    #[error("invalid repository response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, PdsError>;

/// A record as returned by a repository, value still untyped.
#[derive(Debug, Clone)]
pub struct RepoRecord {
    pub uri: AtUri,
    pub cid: Option<String>,
    pub value: serde_json::Value,
}

/// Typed operations against one actor's record repository.
#[async_trait]
pub trait RepoStore: Send + Sync {
    /// List every record of a collection in an actor's repository.
    async fn list_records(&self, repo: &Did, collection: &str) -> Result<Vec<RepoRecord>>;

    /// Fetch a single record by canonical URI. `Ok(None)` when absent.
    async fn get_record(&self, uri: &AtUri) -> Result<Option<RepoRecord>>;

    /// Create a record with a server-assigned rkey; returns its URI.
    async fn create_record(
        &self,
        repo: &Did,
        collection: &str,
        value: serde_json::Value,
    ) -> Result<AtUri>;

    /// Overwrite a record in place.
    async fn put_record(&self, uri: &AtUri, value: serde_json::Value) -> Result<()>;

    /// Delete a record. Deleting an absent record is a no-op.
    async fn delete_record(&self, uri: &AtUri) -> Result<()>;
}

/// Session/identity seam: given an actor, yields the capability to read and
/// write that actor's repository, or `None` when no valid session exists.
/// The login handshake itself lives outside this crate.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn repo_for(&self, did: &Did) -> Option<Arc<dyn RepoStore>>;
}

/// Single-host deployment: every actor's repository lives behind one
/// configured service, so one shared client serves all sessions.
pub struct SingleHost {
    store: Arc<dyn RepoStore>,
}

impl SingleHost {
    pub fn new(store: Arc<dyn RepoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionProvider for SingleHost {
    async fn repo_for(&self, _did: &Did) -> Option<Arc<dyn RepoStore>> {
        Some(self.store.clone())
    }
}
