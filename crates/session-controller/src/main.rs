//! Session Controller
//!
//! Assigns arriving participants to bounded-capacity sessions and drives each
//! started session through its timed phase sequence.
//!
//! # Server
//!
//! A single HTTP server (default: 0.0.0.0:8080) serves:
//! - `GET /ws?name=` - participant WebSocket
//! - `GET /health`, `GET /ready` - probes
//! - `GET /metrics` - Prometheus
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect the Redis flag store
//! 4. Build the media provider client
//! 5. Spawn the session registry actor
//! 6. Start the completion watcher that retires finished sessions
//! 7. Bind and start the HTTP server
//! 8. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::secret::ExposeSecret;
use session_controller::actors::{RegistryConfig, SessionRegistryHandle};
use session_controller::broadcast::ChannelBroadcaster;
use session_controller::config::Config;
use session_controller::gateway::SessionGateway;
use session_controller::observability::metrics::init_metrics_recorder;
use session_controller::observability::{health_router, spawn_readiness_guard, HealthState};
use session_controller::phases::Timeline;
use session_controller::provider::HttpMediaProvider;
use session_controller::redis::RedisFlagStore;
use session_controller::transport::websocket_router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Grace period for in-flight sends after shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Session Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        provider_url = %config.provider_url,
        session_capacity = config.session_capacity,
        start_threshold = config.start_threshold,
        tick_interval_ms = config.tick_interval_ms,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    info!("Connecting to Redis...");
    let flag_store = RedisFlagStore::new(config.redis_url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            e
        })?;
    info!("Redis connection established");

    let provider = HttpMediaProvider::new(
        &config.provider_url,
        config.provider_secret.clone(),
        config.provider_timeout(),
    )?;

    let registry = SessionRegistryHandle::new(
        config.instance_id.clone(),
        RegistryConfig {
            session_capacity: config.session_capacity,
            timeline: Timeline::standard(),
            tick_interval: config.tick_interval(),
        },
        Arc::new(provider),
        Arc::new(ChannelBroadcaster::new()),
    );
    info!("Session registry started");

    let gateway = SessionGateway::new(
        registry.clone(),
        Arc::new(flag_store),
        config.start_threshold,
    );

    let shutdown_token = registry.child_token();

    let completion_watcher = gateway.spawn_completion_watcher(shutdown_token.child_token());

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let app = health_router(Arc::clone(&health_state), Some(prometheus_handle))
        .merge(websocket_router(gateway))
        .layer(TraceLayer::new_for_http());

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {addr}: {e}")
    })?;

    let server_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %addr, "HTTP server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    health_state.set_ready();
    let _readiness_guard = spawn_readiness_guard(Arc::clone(&health_state), registry.child_token());
    info!(addr = %addr, "Session Controller running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so k8s stops sending traffic
    health_state.set_not_ready();

    shutdown_token.cancel();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    if let Err(e) = completion_watcher.await {
        error!(error = %e, "Completion watcher task failed");
    }

    // Stops the registry actor and every running scheduler
    registry.cancel();

    info!("Session Controller shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
