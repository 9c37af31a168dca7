//! Event bus capability: where business code hooks into the connection core.

use serde_json::Value;

use sockwire_core::error::Result;

use crate::socketio::transport::{ConnId, RequestInfo};

/// Notification published by a connection.
#[derive(Debug)]
pub enum BusEvent<'a> {
    /// Transport opened and the handshake was pushed.
    Open { conn: ConnId, request: &'a RequestInfo },
    /// Client asked to connect. An `Err` from the bus is answered with CONNECT_ERROR.
    Connect { conn: ConnId, nsp: &'a str, data: &'a Value },
    /// Client event. The returned value becomes the ACK data when the client asked for one.
    Event {
        conn: ConnId,
        nsp: &'a str,
        name: &'a str,
        args: &'a [Value],
    },
    Disconnect { conn: ConnId, nsp: &'a str },
    Close { conn: ConnId },
}

impl BusEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::Open { .. } => "Open",
            BusEvent::Connect { .. } => "Connect",
            BusEvent::Event { .. } => "Event",
            BusEvent::Disconnect { .. } => "Disconnect",
            BusEvent::Close { .. } => "Close",
        }
    }

    pub fn conn(&self) -> ConnId {
        match self {
            BusEvent::Open { conn, .. }
            | BusEvent::Connect { conn, .. }
            | BusEvent::Event { conn, .. }
            | BusEvent::Disconnect { conn, .. }
            | BusEvent::Close { conn } => *conn,
        }
    }
}

/// Synchronous request/response hook. Must not block the event loop for long.
pub trait EventBus: Send + Sync {
    fn trigger(&self, event: BusEvent<'_>) -> Result<Value>;
}

/// Accepts every connection and acknowledges every event with no data.
#[derive(Debug, Default)]
pub struct LoggingBus;

impl EventBus for LoggingBus {
    fn trigger(&self, event: BusEvent<'_>) -> Result<Value> {
        match &event {
            BusEvent::Event { nsp, name, args, .. } => {
                tracing::info!(conn = %event.conn(), nsp, event = name, argc = args.len(), "event");
            }
            other => tracing::debug!(conn = %other.conn(), bus_event = other.name(), "notification"),
        }
        Ok(Value::Null)
    }
}
