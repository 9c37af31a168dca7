use std::time::Duration;

use serde::Deserialize;
use sockwire_core::error::{Result, SockwireError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub socketio: SocketIoSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            socketio: SocketIoSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SockwireError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.gateway.validate()?;
        self.socketio.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// HTTP path that accepts websocket upgrades.
    #[serde(default = "default_path")]
    pub path: String,

    /// Per-connection outbound queue capacity (frames).
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(SockwireError::BadRequest(
                "gateway.path must start with '/'".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(SockwireError::BadRequest(
                "gateway.outbound_queue must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

/// How the open handshake is written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeFraming {
    /// Bare JSON object.
    #[default]
    Raw,
    /// JSON wrapped in an engine OPEN packet (`0{...}`).
    Engine,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocketIoSection {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    #[serde(default)]
    pub handshake: HandshakeFraming,
}

impl Default for SocketIoSection {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            handshake: HandshakeFraming::default(),
        }
    }
}

impl SocketIoSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=300000).contains(&self.ping_interval_ms) {
            return Err(SockwireError::BadRequest(
                "socketio.ping_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(1000..=600000).contains(&self.ping_timeout_ms) {
            return Err(SockwireError::BadRequest(
                "socketio.ping_timeout_ms must be between 1000 and 600000".into(),
            ));
        }
        Ok(())
    }

    /// Snapshot handed to each connection at open time.
    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            framing: self.handshake,
        }
    }
}

/// Per-connection heartbeat tunables, read once when the connection opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub framing: HandshakeFraming,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        SocketIoSection::default().heartbeat()
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_path() -> String {
    "/socket.io/".into()
}
fn default_outbound_queue() -> usize {
    1024
}
fn default_ping_interval_ms() -> u64 {
    25000
}
fn default_ping_timeout_ms() -> u64 {
    60000
}
