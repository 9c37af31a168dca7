//! Open handshake payload and protocol version negotiation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SockwireError};

/// Negotiated engine protocol revision (`EIO` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion(pub u8);

impl ProtocolVersion {
    /// Assumed when the client does not send a parseable `EIO`.
    pub const LEGACY: ProtocolVersion = ProtocolVersion(3);
    pub const V4: ProtocolVersion = ProtocolVersion(4);

    /// Parse the raw `EIO` query value. Missing or garbage values fall back to
    /// [`ProtocolVersion::LEGACY`].
    pub fn from_query(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<u8>().ok())
            .map(ProtocolVersion)
            .unwrap_or(Self::LEGACY)
    }

    /// Older clients are connected implicitly and ping the server themselves.
    pub fn is_legacy(self) -> bool {
        self < Self::V4
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON object pushed to the client right after the transport opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Transport connection id, diagnostics only.
    pub fd: u64,
    pub sid: String,
    /// Always empty: transport upgrades are not negotiated.
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl Handshake {
    pub fn new(fd: u64, sid: String, ping_interval: u64, ping_timeout: u64) -> Self {
        Self {
            fd,
            sid,
            upgrades: Vec::new(),
            ping_interval,
            ping_timeout,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SockwireError::Internal(format!("handshake encode failed: {e}")))
    }
}
