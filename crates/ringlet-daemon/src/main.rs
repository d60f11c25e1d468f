//! ringlet-daemon: the Ringlet indexing and moderation daemon.
//!
//! Single OS process running a Tokio async runtime. Dashboard clients
//! communicate with the daemon via JSON-RPC over Unix socket.

mod commands;
mod config;
mod events;
mod rpc;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

use ringlet_pds::{PdsClient, PdsConfig, RepoStore, SessionProvider, SingleHost};
use ringlet_sync::SyncThrottle;

use crate::config::DaemonConfig;
use crate::events::{EventBus, EventFilter};
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Per-actor repository session resolver.
    pub sessions: Arc<dyn SessionProvider>,
    /// Shared repository client used for bulk sync.
    pub store: Arc<dyn RepoStore>,
    /// Manual-sync rate limiter.
    pub throttle: Arc<tokio::sync::Mutex<SyncThrottle>>,
    /// Active event subscriptions.
    pub subscriptions: RwLock<HashMap<String, Option<EventFilter>>>,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ringlet=info".parse()?),
        )
        .init();

    info!("Ringlet daemon starting");

    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("ringlet.db");
    let conn = ringlet_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Repository client
    let store: Arc<dyn RepoStore> = Arc::new(PdsClient::with_config(
        &config.pds.service_url,
        PdsConfig {
            request_timeout: Duration::from_secs(config.pds.request_timeout_secs),
            page_size: config.pds.page_size,
        },
    )?);
    let sessions: Arc<dyn SessionProvider> = Arc::new(SingleHost::new(store.clone()));

    // 4. Create event bus
    let event_bus = EventBus::new(1000);

    // 5. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    let throttle = Arc::new(tokio::sync::Mutex::new(SyncThrottle::new(
        config.sync.min_interval_secs,
    )));

    // 6. Build daemon state
    let state = Arc::new(DaemonState {
        db,
        config,
        event_bus,
        sessions,
        store,
        throttle,
        subscriptions: RwLock::new(HashMap::new()),
        shutdown_tx: shutdown_tx.clone(),
    });

    // 7. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 8. Emit DaemonStarted event
    state.event_bus.emit(events::Event {
        event_type: "DaemonStarted".to_string(),
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        payload: serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    });

    // 9. Run the RPC server until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
