//! IPC command handlers.
//!
//! Each submodule implements the commands for one RPC category.

pub mod membership;
pub mod navigation;
pub mod rings;
pub mod sync;
pub mod system;

use std::sync::Arc;

use serde_json::Value;

use ringlet_pds::RepoStore;
use ringlet_ring::TransitionOutcome;
use ringlet_types::{AtUri, Did};

use crate::rpc::RpcError;
use crate::DaemonState;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Current unix time in seconds.
pub(crate) fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) fn require_str<'a>(
    params: &'a Value,
    key: &str,
) -> std::result::Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

pub(crate) fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub(crate) fn require_did(params: &Value, key: &str) -> std::result::Result<Did, RpcError> {
    require_str(params, key)?
        .parse()
        .map_err(|_| RpcError::invalid_params(&format!("{key} must be a did")))
}

pub(crate) fn require_uri(params: &Value, key: &str) -> std::result::Result<AtUri, RpcError> {
    require_str(params, key)?
        .parse()
        .map_err(|_| RpcError::invalid_params(&format!("{key} must be a record uri")))
}

/// Resolve the repository capability for an acting actor.
pub(crate) async fn repo_for(
    state: &Arc<DaemonState>,
    did: &Did,
) -> std::result::Result<Arc<dyn RepoStore>, RpcError> {
    state
        .sessions
        .repo_for(did)
        .await
        .ok_or_else(|| RpcError::remote_unavailable("no repository session for actor"))
}

pub(crate) fn outcome_value(outcome: TransitionOutcome) -> Value {
    let label = match outcome {
        TransitionOutcome::Applied => "applied",
        TransitionOutcome::AlreadyInState => "already_in_state",
    };
    serde_json::json!({"outcome": label})
}
