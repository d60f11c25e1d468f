//! Daemon status and event subscription handlers.

use std::sync::Arc;

use serde_json::Value;

use crate::commands::Result;
use crate::events::EventFilter;
use crate::rpc::RpcError;
use crate::DaemonState;

/// Subscribe to daemon events.
pub async fn subscribe_events(state: &Arc<DaemonState>, params: &Value) -> Result {
    let filter = match params.get("filter") {
        Some(raw) if !raw.is_null() => Some(
            serde_json::from_value::<EventFilter>(raw.clone())
                .map_err(|_| RpcError::invalid_params("malformed event filter"))?,
        ),
        _ => None,
    };

    let sub_id = format!("{:016x}", rand::random::<u64>());
    state
        .subscriptions
        .write()
        .await
        .insert(sub_id.clone(), filter);

    Ok(serde_json::json!({"subscription_id": sub_id}))
}

/// Unsubscribe from daemon events.
pub async fn unsubscribe_events(state: &Arc<DaemonState>, params: &Value) -> Result {
    let subscription_id = params
        .get("subscription_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("subscription_id required"))?;

    let removed = state
        .subscriptions
        .write()
        .await
        .remove(subscription_id)
        .is_some();
    Ok(serde_json::json!({"unsubscribed": removed}))
}

/// Daemon status snapshot.
pub async fn get_status(state: &Arc<DaemonState>) -> Result {
    let subscriptions = state.subscriptions.read().await.len();
    let last_sync = state.throttle.lock().await.last_run_at();

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "event_sequence": state.event_bus.sequence(),
        "subscriptions": subscriptions,
        "last_sync_at": last_sync,
    }))
}
