//! Transport layer (WebSocket).
//!
//! Implements the [`Transport`](crate::socketio::Transport) capability on top
//! of axum websockets and drives one connection state machine per socket.

pub mod registry;
pub mod ws;

pub use registry::WsTransport;
