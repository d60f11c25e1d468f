//! Membership moderation command handlers.

use std::sync::Arc;

use serde_json::Value;

use ringlet_ring::membership;
use ringlet_types::SiteRef;

use crate::commands::{
    now, optional_str, outcome_value, repo_for, require_did, require_str, require_uri, Result,
};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

/// Join a ring with one of the actor's sites.
pub async fn join_ring(state: &Arc<DaemonState>, params: &Value) -> Result {
    let actor = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let site = SiteRef {
        url: require_str(params, "site_url")?.to_string(),
        title: require_str(params, "site_title")?.to_string(),
        rss: optional_str(params, "rss").map(str::to_string),
    };
    let message = optional_str(params, "message");
    let repo = repo_for(state, &actor).await?;

    let mut db = state.db.lock().await;
    let outcome =
        membership::join(repo.as_ref(), &mut db, &actor, &ring, &site, message, now()).await?;

    state.event_bus.emit(Event {
        event_type: "MemberJoined".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": actor.to_string()}),
    });
    Ok(outcome_value(outcome))
}

/// Leave a ring (self-service).
pub async fn leave_ring(state: &Arc<DaemonState>, params: &Value) -> Result {
    let actor = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let repo = repo_for(state, &actor).await?;

    let mut db = state.db.lock().await;
    let outcome = membership::leave(repo.as_ref(), &mut db, &actor, &ring).await?;

    state.event_bus.emit(Event {
        event_type: "MemberLeft".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": actor.to_string()}),
    });
    Ok(outcome_value(outcome))
}

fn require_request_id(params: &Value) -> std::result::Result<i64, RpcError> {
    params
        .get("request_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params("request_id required"))
}

/// Approve a pending join request (owner/admin).
pub async fn approve_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let request_id = require_request_id(params)?;
    let repo = repo_for(state, &acting).await?;

    let mut db = state.db.lock().await;
    let outcome =
        membership::approve_request(repo.as_ref(), &mut db, &acting, request_id, now()).await?;

    state.event_bus.emit(Event {
        event_type: "MembershipApproved".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"request_id": request_id}),
    });
    Ok(outcome_value(outcome))
}

/// Reject a pending join request (owner/admin).
pub async fn reject_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let request_id = require_request_id(params)?;

    let db = state.db.lock().await;
    let outcome = membership::reject_request(&db, &acting, request_id)?;

    state.event_bus.emit(Event {
        event_type: "MembershipRejected".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"request_id": request_id}),
    });
    Ok(outcome_value(outcome))
}

/// Suspend a member (owner/admin).
pub async fn suspend_member(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let member = require_did(params, "member")?;

    let db = state.db.lock().await;
    let outcome = membership::suspend(&db, &acting, &ring, &member)?;

    state.event_bus.emit(Event {
        event_type: "MemberSuspended".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": member.to_string()}),
    });
    Ok(outcome_value(outcome))
}

/// Restore a suspended member (owner/admin).
pub async fn unsuspend_member(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let member = require_did(params, "member")?;

    let db = state.db.lock().await;
    let outcome = membership::unsuspend(&db, &acting, &ring, &member)?;

    state.event_bus.emit(Event {
        event_type: "MemberUnsuspended".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": member.to_string()}),
    });
    Ok(outcome_value(outcome))
}

/// Remove a member from the local index (owner/admin).
pub async fn kick_member(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let member = require_did(params, "member")?;

    let db = state.db.lock().await;
    let outcome = membership::kick(&db, &acting, &ring, &member)?;

    state.event_bus.emit(Event {
        event_type: "MemberKicked".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": member.to_string()}),
    });
    Ok(outcome_value(outcome))
}

/// Block an actor from a ring (owner/admin).
pub async fn block_actor(state: &Arc<DaemonState>, params: &Value) -> Result {
    let acting = require_did(params, "did")?;
    let ring = require_uri(params, "ring")?;
    let subject = require_did(params, "subject")?;
    let reason = optional_str(params, "reason");
    let repo = repo_for(state, &acting).await?;

    let mut db = state.db.lock().await;
    let outcome =
        membership::block_actor(repo.as_ref(), &mut db, &acting, &ring, &subject, reason, now())
            .await?;

    state.event_bus.emit(Event {
        event_type: "MemberBlocked".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"ring": ring.to_string(), "did": subject.to_string()}),
    });
    Ok(outcome_value(outcome))
}

/// Store the result of a widget verification check.
pub async fn record_widget_check(state: &Arc<DaemonState>, params: &Value) -> Result {
    let member_uri = require_str(params, "membership_uri")?;
    let installed = params
        .get("installed")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| RpcError::invalid_params("installed required"))?;

    let db = state.db.lock().await;
    membership::record_widget_check(&db, member_uri, installed, now())?;

    state.event_bus.emit(Event {
        event_type: "WidgetChecked".to_string(),
        timestamp: now(),
        payload: serde_json::json!({"membership_uri": member_uri, "installed": installed}),
    });
    Ok(serde_json::json!({"recorded": true}))
}
