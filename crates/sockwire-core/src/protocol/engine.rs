//! Engine packet framing (outer layer, panic-free).
//!
//! Wire shape: `<digit:type><payload bytes>`. The payload is opaque here.
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, SockwireError};

/// Engine packet type, one ASCII digit on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Open,
    Close,
    Ping,
    Pong,
    Message,
    Upgrade,
    Noop,
}

impl EngineKind {
    pub const ALL: [EngineKind; 7] = [
        EngineKind::Open,
        EngineKind::Close,
        EngineKind::Ping,
        EngineKind::Pong,
        EngineKind::Message,
        EngineKind::Upgrade,
        EngineKind::Noop,
    ];

    /// ASCII digit used on the wire.
    pub fn as_digit(self) -> u8 {
        b'0' + self as u8
    }

    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            b'0' => Some(EngineKind::Open),
            b'1' => Some(EngineKind::Close),
            b'2' => Some(EngineKind::Ping),
            b'3' => Some(EngineKind::Pong),
            b'4' => Some(EngineKind::Message),
            b'5' => Some(EngineKind::Upgrade),
            b'6' => Some(EngineKind::Noop),
            _ => None,
        }
    }

    /// Lowercase name, used as a metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Open => "open",
            EngineKind::Close => "close",
            EngineKind::Ping => "ping",
            EngineKind::Pong => "pong",
            EngineKind::Message => "message",
            EngineKind::Upgrade => "upgrade",
            EngineKind::Noop => "noop",
        }
    }
}

/// One engine-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePacket {
    pub kind: EngineKind,
    /// Opaque payload (zero-copy).
    pub data: Bytes,
}

impl EnginePacket {
    pub fn new(kind: EngineKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Server-initiated heartbeat probe.
    pub fn ping() -> Self {
        Self::new(EngineKind::Ping, Bytes::new())
    }

    /// Heartbeat reply echoing the probe payload.
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(EngineKind::Pong, data)
    }

    pub fn message(data: impl Into<Bytes>) -> Self {
        Self::new(EngineKind::Message, data)
    }

    pub fn open(data: impl Into<Bytes>) -> Self {
        Self::new(EngineKind::Open, data)
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(1 + self.data.len());
        out.put_u8(self.kind.as_digit());
        out.put_slice(&self.data);
        out.freeze()
    }
}

/// Decode an engine packet from a raw frame.
///
/// Fails on an empty frame or an unknown type digit. Callers treat the
/// failure as an unrecognized frame, not as a fatal error.
pub fn decode_engine_packet(mut buf: Bytes) -> Result<EnginePacket> {
    if buf.remaining() < 1 {
        return Err(SockwireError::BadRequest("empty engine frame".into()));
    }

    let digit = buf.get_u8();
    let kind = EngineKind::from_digit(digit).ok_or_else(|| {
        SockwireError::BadRequest(format!("unknown engine packet type: 0x{digit:02x}"))
    })?;

    // Remaining bytes are payload.
    let data = buf.copy_to_bytes(buf.remaining());

    Ok(EnginePacket { kind, data })
}
