//! Protocol modules (engine framing + application packets).
//!
//! Two nested wire formats:
//! - Engine lane: `<digit><opaque payload>` transport framing.
//! - Application lane: `<digit>[nsp,][id][json]`, carried inside engine MESSAGE frames.
//!
//! All parsers are panic-free: malformed input is reported as `SockwireError`
//! instead of panicking or indexing raw buffers.

pub mod engine;
pub mod handshake;
pub mod packet;

pub use engine::{decode_engine_packet, EngineKind, EnginePacket};
pub use handshake::{Handshake, ProtocolVersion};
pub use packet::{decode_packet, Packet, PacketKind, Payload, ROOT_NSP};
