//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use ringlet_ring::ModerationError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Domain errors

    /// Acting actor lacks owner/admin capability (-32020).
    pub fn authorization_denied() -> Self {
        Self {
            code: -32020,
            message: "AUTHORIZATION_DENIED".to_string(),
            data: None,
        }
    }

    /// Subject actor is blocked from the ring (-32021).
    pub fn blocked() -> Self {
        Self {
            code: -32021,
            message: "BLOCKED".to_string(),
            data: None,
        }
    }

    /// Transition contradicts current state (-32022).
    pub fn conflicting_state(detail: &str) -> Self {
        Self {
            code: -32022,
            message: "CONFLICTING_STATE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Ring unknown to the local index (-32023).
    pub fn ring_not_found() -> Self {
        Self {
            code: -32023,
            message: "RING_NOT_FOUND".to_string(),
            data: None,
        }
    }

    /// Remote repository unreachable or misbehaving (-32030).
    pub fn remote_unavailable(detail: &str) -> Self {
        Self {
            code: -32030,
            message: "REMOTE_UNAVAILABLE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Manual sync rate limit hit (-32031).
    pub fn sync_throttled() -> Self {
        Self {
            code: -32031,
            message: "SYNC_THROTTLED".to_string(),
            data: None,
        }
    }
}

impl From<ModerationError> for RpcError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::AuthorizationDenied => Self::authorization_denied(),
            ModerationError::Blocked => Self::blocked(),
            ModerationError::RingNotFound => Self::ring_not_found(),
            ModerationError::ConflictingState(detail) => Self::conflicting_state(&detail),
            ModerationError::Remote(e) => Self::remote_unavailable(&e.to_string()),
            ModerationError::Db(e) => Self::internal_error(&format!("db error: {e}")),
            ModerationError::Encode(e) => Self::internal_error(&format!("encode error: {e}")),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Ring commands
        "list_rings" => commands::rings::list_rings(&state, &request.params).await,
        "create_ring" => commands::rings::create_ring(&state, &request.params).await,
        "update_ring" => commands::rings::update_ring(&state, &request.params).await,
        "delete_ring" => commands::rings::delete_ring(&state, &request.params).await,

        // Membership commands
        "join_ring" => commands::membership::join_ring(&state, &request.params).await,
        "leave_ring" => commands::membership::leave_ring(&state, &request.params).await,
        "approve_request" => commands::membership::approve_request(&state, &request.params).await,
        "reject_request" => commands::membership::reject_request(&state, &request.params).await,
        "suspend_member" => commands::membership::suspend_member(&state, &request.params).await,
        "unsuspend_member" => {
            commands::membership::unsuspend_member(&state, &request.params).await
        }
        "kick_member" => commands::membership::kick_member(&state, &request.params).await,
        "block_actor" => commands::membership::block_actor(&state, &request.params).await,
        "record_widget_check" => {
            commands::membership::record_widget_check(&state, &request.params).await
        }

        // Sync commands
        "register_user" => commands::sync::register_user(&state, &request.params).await,
        "sync_actor" => commands::sync::sync_actor(&state, &request.params).await,
        "sync_all_users" => commands::sync::sync_all_users(&state).await,
        "remove_actor" => commands::sync::remove_actor(&state, &request.params).await,

        // Navigation commands
        "ring_next" => commands::navigation::ring_next(&state, &request.params).await,
        "ring_prev" => commands::navigation::ring_prev(&state, &request.params).await,
        "ring_random" => commands::navigation::ring_random(&state, &request.params).await,

        // Event subscription
        "subscribe_events" => commands::system::subscribe_events(&state, &request.params).await,
        "unsubscribe_events" => {
            commands::system::unsubscribe_events(&state, &request.params).await
        }
        "get_status" => commands::system::get_status(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
