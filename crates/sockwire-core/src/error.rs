//! Shared error type across sockwire crates.

use thiserror::Error;

/// Stable error codes, used in logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed frame or packet.
    BadRequest,
    /// Application packet type this server does not implement.
    UnsupportedPacket,
    /// Business logic refused the request.
    Rejected,
    /// Outbound path unavailable.
    Transport,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedPacket => "UNSUPPORTED_PACKET",
            ClientCode::Rejected => "REJECTED",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SockwireError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum SockwireError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported packet type: {0}")]
    UnsupportedPacket(u8),
    /// Raised by event bus handlers. Displays as the bare message because
    /// that text is sent to the client inside CONNECT_ERROR.
    #[error("{0}")]
    Rejected(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SockwireError {
    /// Map internal error to a stable code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            SockwireError::BadRequest(_) => ClientCode::BadRequest,
            SockwireError::UnsupportedPacket(_) => ClientCode::UnsupportedPacket,
            SockwireError::Rejected(_) => ClientCode::Rejected,
            SockwireError::Transport(_) => ClientCode::Transport,
            SockwireError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Shorthand for business handlers refusing a request.
    pub fn rejected(msg: impl Into<String>) -> Self {
        SockwireError::Rejected(msg.into())
    }
}
