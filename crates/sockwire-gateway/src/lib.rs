//! sockwire gateway library entry.
//!
//! This crate wires the websocket transport, the Socket.IO connection core,
//! configuration, and ops endpoints into a gateway. It is consumed by the
//! binary (`main.rs`) and by integration tests, which drive
//! [`socketio::Connection`] directly with in-memory capabilities.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod socketio;
pub mod transport;
