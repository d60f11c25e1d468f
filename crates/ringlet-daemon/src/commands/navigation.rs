//! Ring traversal command handlers.

use std::sync::Arc;

use serde_json::Value;

use ringlet_ring::navigation;
use ringlet_types::AtUri;

use crate::commands::{optional_str, require_uri, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError::internal_error(&e.to_string())
}

/// The next approved site in ring order, wrapping at the end.
pub async fn ring_next(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ring = require_uri(params, "ring")?;
    let from = optional_str(params, "from");

    let db = state.db.lock().await;
    let url = navigation::next_site(&db, &ring, from).map_err(internal)?;
    Ok(serde_json::json!({"url": url}))
}

/// The previous approved site in ring order, wrapping at the start.
pub async fn ring_prev(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ring = require_uri(params, "ring")?;
    let from = optional_str(params, "from");

    let db = state.db.lock().await;
    let url = navigation::prev_site(&db, &ring, from).map_err(internal)?;
    Ok(serde_json::json!({"url": url}))
}

/// A random approved site, ring-scoped when `ring` is given.
pub async fn ring_random(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ring = match optional_str(params, "ring") {
        Some(raw) => Some(
            raw.parse::<AtUri>()
                .map_err(|_| RpcError::invalid_params("ring must be a record uri"))?,
        ),
        None => None,
    };

    let db = state.db.lock().await;
    let url = navigation::random_site(&db, ring.as_ref()).map_err(internal)?;
    Ok(serde_json::json!({"url": url}))
}
