//! Connection state machine.
//!
//! Responsibilities:
//! - Open handshake (version dependent: legacy clients are connected
//!   implicitly, v4+ clients send CONNECT and answer server pings)
//! - Inbound dispatch: engine framing first, then application packets
//! - Heartbeat: every inbound frame resets the liveness window
//! - Teardown: timers are cancelled before anything else happens
//!
//! Error policy: an unrecognized engine frame is ignored, a bad application
//! packet closes this connection, a failed CONNECT becomes CONNECT_ERROR, and
//! any other event bus error is returned to the caller.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::time::{Duration, Instant};

use sockwire_core::error::{Result, SockwireError};
use sockwire_core::protocol::{
    decode_engine_packet, decode_packet, EngineKind, EnginePacket, Handshake, Packet, PacketKind,
    Payload, ProtocolVersion, ROOT_NSP,
};
use sockwire_core::sid;

use crate::config::{HandshakeFraming, HeartbeatConfig};
use crate::socketio::bus::{BusEvent, EventBus};
use crate::socketio::heartbeat::{millis, Heartbeat, TimerKind};
use crate::socketio::transport::{ConnId, RequestInfo, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    AwaitingHandshake,
    Open,
    Connected,
    Closed,
}

/// Why a connection ended. Recorded once, on the first close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    HeartbeatTimeout,
    ClientDisconnect,
    ProtocolViolation,
    HandlerError,
    TransportClosed,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::HeartbeatTimeout => "heartbeat_timeout",
            CloseReason::ClientDisconnect => "client_disconnect",
            CloseReason::ProtocolViolation => "protocol_violation",
            CloseReason::HandlerError => "handler_error",
            CloseReason::TransportClosed => "transport_closed",
        }
    }
}

/// Anything [`Connection::push`] can put on the wire.
#[derive(Debug, Clone)]
pub enum Outgoing {
    /// Encoded, then wrapped in an engine MESSAGE.
    Packet(Packet),
    Engine(EnginePacket),
    Raw(Bytes),
}

impl From<Packet> for Outgoing {
    fn from(p: Packet) -> Self {
        Outgoing::Packet(p)
    }
}

impl From<EnginePacket> for Outgoing {
    fn from(p: EnginePacket) -> Self {
        Outgoing::Engine(p)
    }
}

impl From<Bytes> for Outgoing {
    fn from(b: Bytes) -> Self {
        Outgoing::Raw(b)
    }
}

pub struct Connection {
    id: ConnId,
    sid: String,
    /// Session id handed out in the v4 CONNECT reply.
    socket_sid: Option<String>,
    eio: ProtocolVersion,
    cfg: HeartbeatConfig,
    heartbeat: Heartbeat,
    state: LifecycleState,
    close_reason: Option<CloseReason>,
    transport: Arc<dyn Transport>,
    bus: Arc<dyn EventBus>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("sid", &self.sid)
            .field("eio", &self.eio)
            .field("state", &self.state)
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Transport "open" callback: [`Connection::new`] followed by [`Connection::start`].
    pub fn open(
        id: ConnId,
        request: &RequestInfo,
        cfg: HeartbeatConfig,
        transport: Arc<dyn Transport>,
        bus: Arc<dyn EventBus>,
    ) -> Result<Self> {
        let mut conn = Self::new(id, request.protocol_version(), cfg, transport, bus);
        conn.start(request)?;
        Ok(conn)
    }

    /// A connection that has not sent anything yet.
    pub fn new(
        id: ConnId,
        eio: ProtocolVersion,
        cfg: HeartbeatConfig,
        transport: Arc<dyn Transport>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            id,
            sid: sid::generate(),
            socket_sid: None,
            eio,
            cfg,
            heartbeat: Heartbeat::default(),
            state: LifecycleState::AwaitingHandshake,
            close_reason: None,
            transport,
            bus,
        }
    }

    /// Push the handshake, notify the bus, and arm the heartbeat for the
    /// negotiated protocol version.
    ///
    /// On error the connection is still owned by the caller, which must close
    /// it and report [`Connection::on_close`] like any other teardown.
    pub fn start(&mut self, request: &RequestInfo) -> Result<()> {
        let handshake = Handshake::new(
            self.id.0,
            self.sid.clone(),
            millis(self.cfg.ping_interval),
            millis(self.cfg.ping_timeout),
        );
        let json = handshake.to_json()?;
        match self.cfg.framing {
            HandshakeFraming::Raw => self.push(Bytes::from(json))?,
            HandshakeFraming::Engine => self.push(EnginePacket::open(json))?,
        };
        self.state = LifecycleState::Open;

        self.bus.trigger(BusEvent::Open { conn: self.id, request })?;

        let now = Instant::now();
        if self.eio.is_legacy() {
            let window = self.liveness_window();
            self.heartbeat.reset_timeout(now, window);
            let data = serde_json::to_value(&handshake)
                .map_err(|e| SockwireError::Internal(format!("handshake to value: {e}")))?;
            self.connect(ROOT_NSP, &data)?;
        } else {
            self.heartbeat.schedule_ping(now, self.cfg.ping_interval);
        }

        tracing::debug!(conn = %self.id, sid = %self.sid, eio = %self.eio, "handshake sent");
        Ok(())
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Handshake session id.
    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn socket_sid(&self) -> Option<&str> {
        self.socket_sid.as_deref()
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.eio
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// When the session loop must next call [`Connection::on_timer`].
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heartbeat.next_deadline()
    }

    fn liveness_window(&self) -> Duration {
        self.cfg.ping_interval + self.cfg.ping_timeout
    }

    /// Transport "message" callback.
    ///
    /// Errors raised by the event bus while handling an EVENT or DISCONNECT are
    /// returned; the caller decides whether to fail the connection.
    pub fn on_message(&mut self, frame: Bytes) -> Result<()> {
        if self.state == LifecycleState::Closed {
            return Ok(());
        }

        // any traffic counts as liveness
        let now = Instant::now();
        let window = self.liveness_window();
        self.heartbeat.reset_timeout(now, window);

        let packet = match decode_engine_packet(frame) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(conn = %self.id, error = %e, "ignoring unrecognized engine frame");
                return Ok(());
            }
        };

        match packet.kind {
            EngineKind::Message => self.on_packet(&packet.data),
            EngineKind::Ping => {
                self.push(EnginePacket::pong(packet.data))?;
                Ok(())
            }
            EngineKind::Pong => {
                self.heartbeat.schedule_ping(now, self.cfg.ping_interval);
                Ok(())
            }
            other => {
                tracing::trace!(conn = %self.id, kind = other.as_str(), "engine packet ignored");
                Ok(())
            }
        }
    }

    fn on_packet(&mut self, payload: &[u8]) -> Result<()> {
        let packet = match decode_packet(payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(conn = %self.id, error = %e, "malformed application packet");
                self.close(CloseReason::ProtocolViolation);
                return Ok(());
            }
        };
        tracing::debug!(conn = %self.id, kind = packet.kind.as_str(), nsp = %packet.nsp, id = ?packet.id, "packet");

        match packet.kind {
            PacketKind::Connect => {
                let data = packet.data.map(Payload::into_value).unwrap_or(Value::Null);
                self.connect(&packet.nsp, &data)
            }
            PacketKind::Event => self.on_event(&packet),
            PacketKind::Disconnect => {
                let res = self.bus.trigger(BusEvent::Disconnect {
                    conn: self.id,
                    nsp: &packet.nsp,
                });
                self.close(CloseReason::ClientDisconnect);
                res.map(|_| ())
            }
            PacketKind::Ack | PacketKind::ConnectError => {
                tracing::warn!(conn = %self.id, kind = packet.kind.as_str(), "unsupported packet from client");
                self.close(CloseReason::ProtocolViolation);
                Ok(())
            }
        }
    }

    fn on_event(&mut self, packet: &Packet) -> Result<()> {
        let (name, args) = packet.event_parts()?;
        let result = self.bus.trigger(BusEvent::Event {
            conn: self.id,
            nsp: &packet.nsp,
            name,
            args,
        })?;

        if let Some(id) = packet.id {
            let mut ack = Packet::create(PacketKind::Ack)
                .with_nsp(packet.nsp.clone())
                .with_id(id);
            if let Some(data) = ack_payload(result) {
                ack = ack.with_data(data);
            }
            self.push(ack)?;
        }
        Ok(())
    }

    /// CONNECT sequence: let the bus authorize, then answer CONNECT or CONNECT_ERROR.
    fn connect(&mut self, nsp: &str, data: &Value) -> Result<()> {
        let outcome = self.bus.trigger(BusEvent::Connect {
            conn: self.id,
            nsp,
            data,
        });
        let reply = match outcome {
            Ok(_) => {
                let mut packet = Packet::create(PacketKind::Connect).with_nsp(nsp);
                if !self.eio.is_legacy() {
                    let socket_sid = sid::generate();
                    packet = packet.with_data(object([("sid", Value::String(socket_sid.clone()))]));
                    self.socket_sid = Some(socket_sid);
                }
                self.state = LifecycleState::Connected;
                packet
            }
            Err(e) => {
                tracing::info!(conn = %self.id, nsp, error = %e, "connect rejected");
                Packet::create(PacketKind::ConnectError)
                    .with_nsp(nsp)
                    .with_data(object([("message", Value::String(e.to_string()))]))
            }
        };

        self.push(reply)?;
        Ok(())
    }

    /// Timer callback. Call once `next_deadline()` has passed.
    pub fn on_timer(&mut self, now: Instant) -> Result<()> {
        while let Some(kind) = self.heartbeat.poll(now) {
            match kind {
                TimerKind::PingTimeout => {
                    tracing::info!(conn = %self.id, "heartbeat timeout");
                    self.close(CloseReason::HeartbeatTimeout);
                }
                TimerKind::PingInterval => {
                    self.push(EnginePacket::ping())?;
                    self.heartbeat.reset_timeout(now, self.cfg.ping_timeout);
                }
            }
        }
        Ok(())
    }

    /// Encode as needed and hand the frame to the transport.
    pub fn push(&self, out: impl Into<Outgoing>) -> Result<bool> {
        let frame = match out.into() {
            Outgoing::Packet(p) => EnginePacket::message(p.encode()?).encode(),
            Outgoing::Engine(p) => p.encode(),
            Outgoing::Raw(b) => b,
        };
        let ok = self.transport.push(self.id, frame);
        if !ok {
            tracing::warn!(conn = %self.id, "push dropped by transport");
        }
        Ok(ok)
    }

    /// Fire-and-forget server event, no ack id.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<bool> {
        let packet = Packet::create(PacketKind::Event).with_data(object([
            ("type", Value::String(event.to_string())),
            ("data", Value::Array(args)),
        ]));
        self.push(packet)
    }

    /// Server-side close. Timers are cancelled before the transport is asked
    /// to hang up; the transport later reports back through [`Connection::on_close`].
    pub fn close(&mut self, reason: CloseReason) {
        self.heartbeat.cancel_all();
        if self.state == LifecycleState::Closed {
            return;
        }
        self.state = LifecycleState::Closed;
        self.close_reason.get_or_insert(reason);
        self.transport.close(self.id);
    }

    /// Transport "close" callback. Consumes the connection.
    pub fn on_close(mut self) -> Result<()> {
        self.heartbeat.cancel_all();
        self.state = LifecycleState::Closed;
        self.close_reason.get_or_insert(CloseReason::TransportClosed);
        self.bus.trigger(BusEvent::Close { conn: self.id })?;
        Ok(())
    }
}

/// Bus return value as ACK arguments.
fn ack_payload(result: Value) -> Option<Payload> {
    match result {
        Value::Null => None,
        Value::Array(v) => Some(Payload::Array(v)),
        other => Some(Payload::Array(vec![other])),
    }
}

fn object<const N: usize>(fields: [(&str, Value); N]) -> Payload {
    Payload::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Map<String, Value>>(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ack_payload_wraps_scalars() {
        assert_eq!(ack_payload(Value::Null), None);
        assert_eq!(ack_payload(json!("pong")), Some(Payload::Array(vec![json!("pong")])));
        assert_eq!(ack_payload(json!([1, 2])), Some(Payload::Array(vec![json!(1), json!(2)])));
    }

    #[test]
    fn close_reasons_have_metric_labels() {
        assert_eq!(CloseReason::HeartbeatTimeout.as_str(), "heartbeat_timeout");
        assert_eq!(CloseReason::ProtocolViolation.as_str(), "protocol_violation");
    }
}
