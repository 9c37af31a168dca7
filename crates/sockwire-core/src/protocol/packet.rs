//! Application packets (inner layer, carried inside engine MESSAGE frames).
//!
//! Wire shape: `<digit:type>[<nsp>,][<decimal id>][<json>]`.
//! The namespace is only written when it differs from the root `/`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SockwireError};

/// Root namespace. Omitted on the wire.
pub const ROOT_NSP: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl PacketKind {
    pub const ALL: [PacketKind; 5] = [
        PacketKind::Connect,
        PacketKind::Disconnect,
        PacketKind::Event,
        PacketKind::Ack,
        PacketKind::ConnectError,
    ];

    pub fn as_digit(self) -> u8 {
        b'0' + self as u8
    }

    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            b'0' => Some(PacketKind::Connect),
            b'1' => Some(PacketKind::Disconnect),
            b'2' => Some(PacketKind::Event),
            b'3' => Some(PacketKind::Ack),
            b'4' => Some(PacketKind::ConnectError),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PacketKind::Connect => "connect",
            PacketKind::Disconnect => "disconnect",
            PacketKind::Event => "event",
            PacketKind::Ack => "ack",
            PacketKind::ConnectError => "connect_error",
        }
    }
}

/// JSON body of a packet.
///
/// Positional arguments (EVENT, ACK) travel as an array. Keyed bodies
/// (CONNECT `{sid}`, CONNECT_ERROR `{message}`, server events `{type, data}`)
/// travel as an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl Payload {
    /// Positional arguments; empty for object bodies.
    pub fn args(&self) -> &[Value] {
        match self {
            Payload::Array(v) => v,
            Payload::Object(_) => &[],
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Array(v) => Value::Array(v),
            Payload::Object(m) => Value::Object(m),
        }
    }
}

/// One application packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Namespace, `/` when absent on the wire.
    pub nsp: String,
    /// Ack correlation id. Present only when the sender expects an ACK.
    pub id: Option<u64>,
    pub data: Option<Payload>,
}

impl Packet {
    /// Builder with defaults: root namespace, no id, no data.
    pub fn create(kind: PacketKind) -> Self {
        Self {
            kind,
            nsp: ROOT_NSP.to_string(),
            id: None,
            data: None,
        }
    }

    pub fn with_nsp(mut self, nsp: impl Into<String>) -> Self {
        self.nsp = nsp.into();
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    /// Positional arguments, empty when the packet carries none.
    pub fn args(&self) -> &[Value] {
        self.data.as_ref().map(Payload::args).unwrap_or(&[])
    }

    /// Split an EVENT body into `(name, remaining args)`.
    ///
    /// `["name", ...args]` is the positional form. `{"type": name, "data": args}`
    /// is the keyed form written by server-side emits; a non-array `data` is a
    /// single argument.
    pub fn event_parts(&self) -> Result<(&str, &[Value])> {
        match &self.data {
            Some(Payload::Object(body)) => {
                let name = match body.get("type") {
                    Some(Value::String(name)) => name.as_str(),
                    Some(_) => {
                        return Err(SockwireError::BadRequest("event type must be a string".into()))
                    }
                    None => return Err(SockwireError::BadRequest("event without type".into())),
                };
                let args = match body.get("data") {
                    None => &[][..],
                    Some(Value::Array(v)) => v.as_slice(),
                    Some(v) => std::slice::from_ref(v),
                };
                Ok((name, args))
            }
            _ => match self.args().split_first() {
                Some((Value::String(name), rest)) => Ok((name.as_str(), rest)),
                Some(_) => Err(SockwireError::BadRequest("event name must be a string".into())),
                None => Err(SockwireError::BadRequest("event without data".into())),
            },
        }
    }

    /// Serialize to wire bytes (without engine framing).
    pub fn encode(&self) -> Result<Bytes> {
        let mut out = String::with_capacity(16);
        out.push(char::from(self.kind.as_digit()));
        if !self.nsp.is_empty() && self.nsp != ROOT_NSP {
            out.push_str(&self.nsp);
            out.push(',');
        }
        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            let json = serde_json::to_string(data)
                .map_err(|e| SockwireError::Internal(format!("packet json encode failed: {e}")))?;
            out.push_str(&json);
        }
        Ok(Bytes::from(out))
    }
}

/// Decode an application packet from an engine MESSAGE payload.
pub fn decode_packet(buf: &[u8]) -> Result<Packet> {
    let s = std::str::from_utf8(buf)
        .map_err(|e| SockwireError::BadRequest(format!("packet is not utf-8: {e}")))?;

    let digit = *s
        .as_bytes()
        .first()
        .ok_or_else(|| SockwireError::BadRequest("empty packet".into()))?;
    let kind = match PacketKind::from_digit(digit) {
        Some(k) => k,
        None if digit.is_ascii_digit() => {
            return Err(SockwireError::UnsupportedPacket(digit - b'0'))
        }
        None => {
            return Err(SockwireError::BadRequest(format!(
                "invalid packet type: 0x{digit:02x}"
            )))
        }
    };
    // first byte is ASCII, so 1 is a char boundary
    let mut rest = s.get(1..).unwrap_or_default();

    // namespace, terminated by ','
    let mut nsp = ROOT_NSP.to_string();
    if rest.starts_with('/') {
        let (n, r) = rest.split_once(',').unwrap_or((rest, ""));
        nsp = n.to_string();
        rest = r;
    }

    // ack id, a run of digits
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let mut id = None;
    if digits > 0 {
        let (n, r) = rest.split_at(digits);
        id = Some(
            n.parse::<u64>()
                .map_err(|e| SockwireError::BadRequest(format!("invalid ack id: {e}")))?,
        );
        rest = r;
    }

    let data = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Payload>(rest)
                .map_err(|e| SockwireError::BadRequest(format!("invalid packet json: {e}")))?,
        )
    };

    let packet = Packet { kind, nsp, id, data };
    if kind == PacketKind::Event {
        packet.event_parts()?;
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    fn payload(v: Value) -> Payload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn namespace_id_and_data_combinations_round_trip() {
        let event_bodies = vec![
            Some(payload(json!(["ping", 1, 2]))),
            Some(payload(json!({"type": "news", "data": [1, "a"]}))),
        ];
        let mut any_bodies = event_bodies.clone();
        any_bodies.extend([None, Some(payload(json!({"sid": "abc"})))]);

        for kind in PacketKind::ALL {
            let datas = if kind == PacketKind::Event { &event_bodies } else { &any_bodies };
            for nsp in [ROOT_NSP, "/admin"] {
                for id in [None, Some(0), Some(7), Some(12345)] {
                    for data in datas {
                        let p = Packet { kind, nsp: nsp.to_string(), id, data: data.clone() };
                        let wire = p.encode().unwrap();
                        assert_eq!(decode_packet(&wire).unwrap(), p, "wire={wire:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn root_namespace_is_omitted() {
        let p = Packet::create(PacketKind::Ack)
            .with_id(7)
            .with_data(Payload::Array(vec![json!("pong")]));
        assert_eq!(p.encode().unwrap(), Bytes::from_static(br#"37["pong"]"#));
    }

    #[test]
    fn custom_namespace_is_written_with_comma() {
        let p = Packet::create(PacketKind::Connect).with_nsp("/admin");
        assert_eq!(p.encode().unwrap(), Bytes::from_static(b"0/admin,"));
    }

    #[test]
    fn event_without_data_is_a_violation() {
        assert!(decode_packet(b"2").is_err());
        assert!(decode_packet(b"2[]").is_err());
        assert!(decode_packet(b"2[1,2]").is_err());
        assert!(decode_packet(b"2[\"x\"").is_err());
    }

    #[test]
    fn keyed_event_body_is_accepted() {
        let p = decode_packet(br#"2{"data":[1,"a"],"type":"news"}"#).unwrap();
        let (name, args) = p.event_parts().unwrap();
        assert_eq!(name, "news");
        assert_eq!(args, &[json!(1), json!("a")]);

        let p = decode_packet(br#"2{"type":"tick","data":5}"#).unwrap();
        assert_eq!(p.event_parts().unwrap(), ("tick", &[json!(5)][..]));

        assert!(decode_packet(b"2{}").is_err());
        assert!(decode_packet(br#"2{"data":[1]}"#).is_err());
        assert!(decode_packet(br#"2{"type":3}"#).is_err());
    }

    #[test]
    fn binary_types_are_unsupported() {
        let err = decode_packet(b"51-[\"x\",{}]").unwrap_err();
        assert!(matches!(err, SockwireError::UnsupportedPacket(5)));
    }

    #[test]
    fn event_parts_splits_name_from_args() {
        let p = decode_packet(br#"27["ping",1,2]"#).unwrap();
        let (name, args) = p.event_parts().unwrap();
        assert_eq!(p.id, Some(7));
        assert_eq!(name, "ping");
        assert_eq!(args, &[json!(1), json!(2)]);
    }
}
