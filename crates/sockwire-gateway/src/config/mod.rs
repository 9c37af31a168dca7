//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use sockwire_core::error::{Result, SockwireError};

pub use schema::{GatewayConfig, GatewaySection, HandshakeFraming, HeartbeatConfig, SocketIoSection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        SockwireError::Internal(format!("read config failed ({}): {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| SockwireError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load `path` if it exists, otherwise fall back to built-in defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_from_file(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        let cfg = GatewayConfig::default();
        cfg.validate()?;
        Ok(cfg)
    }
}
