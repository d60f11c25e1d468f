//! Ring administration command handlers.

use std::sync::Arc;

use serde_json::Value;

use ringlet_ring::{admin, view::ViewError, RingProfile};
use ringlet_types::{AcceptancePolicy, Did, RecruitmentStatus};

use crate::commands::{now, optional_str, repo_for, require_did, require_str, require_uri, Result};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

/// The actor's unified ring list: owned rings, held memberships, local
/// cache overlay.
pub async fn list_rings(state: &Arc<DaemonState>, params: &Value) -> Result {
    let did = require_did(params, "did")?;
    let repo = repo_for(state, &did).await?;

    let mut db = state.db.lock().await;
    let rings = ringlet_ring::unified_rings(repo.as_ref(), &mut db, &did)
        .await
        .map_err(|e| match e {
            ViewError::Remote(e) => RpcError::remote_unavailable(&e.to_string()),
            ViewError::Db(e) => RpcError::internal_error(&format!("db error: {e}")),
        })?;
    serde_json::to_value(rings).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn parse_profile(params: &Value) -> std::result::Result<RingProfile, RpcError> {
    let title = require_str(params, "title")?;
    let status = match optional_str(params, "status") {
        Some(raw) => RecruitmentStatus::parse(raw)
            .ok_or_else(|| RpcError::invalid_params("status must be open or closed"))?,
        None => RecruitmentStatus::default(),
    };
    let policy = match optional_str(params, "policy") {
        Some(raw) => AcceptancePolicy::parse(raw)
            .ok_or_else(|| RpcError::invalid_params("policy must be automatic or manual"))?,
        None => AcceptancePolicy::default(),
    };
    let admin = match optional_str(params, "admin") {
        Some(raw) => Some(
            raw.parse::<Did>()
                .map_err(|_| RpcError::invalid_params("admin must be a did"))?,
        ),
        None => None,
    };
    Ok(RingProfile {
        title: title.to_string(),
        description: optional_str(params, "description").map(str::to_string),
        slug: optional_str(params, "slug").map(str::to_string),
        status,
        policy,
        admin,
        banner: optional_str(params, "banner").map(str::to_string),
    })
}

/// Create a ring owned by the acting actor.
pub async fn create_ring(state: &Arc<DaemonState>, params: &Value) -> Result {
    let owner = require_did(params, "did")?;
    let profile = parse_profile(params)?;
    let repo = repo_for(state, &owner).await?;

    let mut db = state.db.lock().await;
    let uri = admin::create_ring(repo.as_ref(), &mut db, &owner, &profile, now()).await?;

    state.event_bus.emit(Event {
        event_type: "RingCreated".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": uri.to_string(), "did": owner.to_string()}),
    });
    Ok(serde_json::json!({"uri": uri.to_string()}))
}

/// Update a ring's profile (owner or delegated admin).
pub async fn update_ring(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let uri = require_uri(params, "uri")?;
    let profile = parse_profile(params)?;
    let repo = repo_for(state, &acting).await?;

    let mut db = state.db.lock().await;
    admin::update_ring(repo.as_ref(), &mut db, &acting, &uri, &profile).await?;

    state.event_bus.emit(Event {
        event_type: "RingUpdated".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": uri.to_string()}),
    });
    Ok(serde_json::json!({"updated": true}))
}

/// Delete a ring and everything scoped to it (owner only).
pub async fn delete_ring(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let uri = require_uri(params, "uri")?;
    let repo = repo_for(state, &acting).await?;

    let mut db = state.db.lock().await;
    admin::delete_ring(repo.as_ref(), &mut db, &acting, &uri).await?;

    state.event_bus.emit(Event {
        event_type: "RingDeleted".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": uri.to_string()}),
    });
    Ok(serde_json::json!({"deleted": true}))
}
