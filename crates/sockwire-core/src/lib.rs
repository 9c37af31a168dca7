//! sockwire core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the two nested wire formats (engine framing and
//! application packets), the open handshake payload, and the error surface
//! shared by the gateway. It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `SockwireError`/`Result` so a hostile
//! frame can at worst close its own connection.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod sid;

/// Shared result type.
pub use error::{Result, SockwireError};
