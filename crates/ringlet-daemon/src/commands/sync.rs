//! Sync and actor-registry command handlers.

use std::sync::Arc;

use serde_json::Value;

use ringlet_db::queries;
use ringlet_sync::engine;

use crate::commands::{now, optional_str, repo_for, require_did, Result};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

fn internal(e: impl std::fmt::Display) -> RpcError {
    RpcError::internal_error(&e.to_string())
}

/// Register an actor with the index so bulk sync covers them.
pub async fn register_user(state: &Arc<DaemonState>, params: &Value) -> Result {
    let did = require_did(params, "did")?;
    let handle = optional_str(params, "handle");
    let pds_url = optional_str(params, "pds_url");

    let db = state.db.lock().await;
    queries::users::upsert(&db, did.as_str(), handle, pds_url, now()).map_err(internal)?;
    Ok(serde_json::json!({"registered": true}))
}

/// Sync one actor's repository into the local index.
pub async fn sync_actor(state: &Arc<DaemonState>, params: &Value) -> Result {
    let did = require_did(params, "did")?;
    let repo = repo_for(state, &did).await?;

    let mut db = state.db.lock().await;
    let report = engine::sync_actor(repo.as_ref(), &mut db, &did, now())
        .await
        .map_err(internal)?;

    state.event_bus.emit(Event {
        event_type: "ActorSynced".to_string(),
        timestamp: now(),
        payload: serde_json::json!({
            "did": did.to_string(),
            "errors": report.errors.len(),
        }),
    });
    serde_json::to_value(report).map_err(internal)
}

/// Sync every registered actor. Rate-limited by the daemon throttle.
pub async fn sync_all_users(state: &Arc<DaemonState>) -> Result {
    {
        let mut throttle = state.throttle.lock().await;
        if !throttle.try_begin(now()) {
            return Err(RpcError::sync_throttled());
        }
    }

    let mut db = state.db.lock().await;
    let reports = engine::sync_all_users(state.store.as_ref(), &mut db, now())
        .await
        .map_err(internal)?;

    state.event_bus.emit(Event {
        event_type: "SyncCompleted".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"actors": reports.len()}),
    });
    serde_json::to_value(reports).map_err(internal)
}

/// Account-deletion teardown: remote records and local rows.
pub async fn remove_actor(state: &Arc<DaemonState>, params: &Value) -> Result {
    let did = require_did(params, "did")?;
    let repo = repo_for(state, &did).await?;

    let mut db = state.db.lock().await;
    engine::remove_actor(repo.as_ref(), &mut db, &did)
        .await
        .map_err(internal)?;

    state.event_bus.emit(Event {
        event_type: "ActorRemoved".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"did": did.to_string()}),
    });
    Ok(serde_json::json!({"removed": true}))
}
