//! Transport capability consumed by the connection core.

use std::collections::HashMap;
use std::fmt;

use axum::http::HeaderMap;
use bytes::Bytes;

use sockwire_core::protocol::ProtocolVersion;

/// Opaque transport connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound half of a websocket server, as seen by one connection.
pub trait Transport: Send + Sync {
    /// Queue one frame. Returns false when the frame could not be delivered.
    fn push(&self, conn: ConnId, frame: Bytes) -> bool;
    /// Ask the transport to hang up. Already-queued frames are flushed first.
    fn close(&self, conn: ConnId);
}

/// The upgrade request that opened a connection.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub query: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
}

impl RequestInfo {
    pub fn from_parts(query: HashMap<String, String>, headers: &HeaderMap) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        Self { query, headers }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Negotiated protocol version from the `EIO` query parameter.
    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::from_query(self.query_param("EIO"))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn request_info_reads_version_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("node-XMLHttpRequest"));
        let query = HashMap::from([("EIO".to_string(), "4".to_string())]);

        let req = RequestInfo::from_parts(query, &headers);

        assert_eq!(req.protocol_version(), ProtocolVersion::V4);
        assert_eq!(req.header("User-Agent"), Some("node-XMLHttpRequest"));
        assert_eq!(req.query_param("transport"), None);
    }
}
