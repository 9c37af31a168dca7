//! Shared application state for the sockwire gateway.

use std::sync::Arc;

use sockwire_core::error::Result;

use crate::config::{GatewayConfig, HeartbeatConfig};
use crate::obs::GatewayMetrics;
use crate::socketio::EventBus;
use crate::transport::WsTransport;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    transport: Arc<WsTransport>,
    bus: Arc<dyn EventBus>,
    metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Build application state around the business event bus.
    /// Returns Result so main can handle a bad config gracefully (no panic).
    pub fn new(cfg: GatewayConfig, bus: Arc<dyn EventBus>) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(GatewayMetrics::default());
        let transport = Arc::new(WsTransport::new(Arc::clone(&metrics)));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                transport,
                bus,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    /// Heartbeat tunables snapshot for a connection opening now.
    pub fn heartbeat(&self) -> HeartbeatConfig {
        self.inner.cfg.socketio.heartbeat()
    }

    pub fn transport(&self) -> Arc<WsTransport> {
        Arc::clone(&self.inner.transport)
    }

    pub fn bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.inner.bus)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }
}
