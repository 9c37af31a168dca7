//! sockwire gateway binary.
//!
//! - WebSocket endpoint: `<gateway.path>?EIO=4&transport=websocket`
//! - One tracing span per connection
//! - Config from `$SOCKWIRE_CONFIG` (default `sockwire.yaml`, optional)

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sockwire_core::error::{Result, SockwireError};
use sockwire_gateway::{app_state::AppState, config, router, socketio::LoggingBus};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::var("SOCKWIRE_CONFIG").unwrap_or_else(|_| "sockwire.yaml".into());
    let cfg = config::load_or_default(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| SockwireError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = AppState::new(cfg, Arc::new(LoggingBus))?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "sockwire-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| SockwireError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| SockwireError::Internal(format!("server failed: {e}")))
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    state.metrics().set_draining();
    tracing::info!("signal received, starting graceful shutdown");
}
