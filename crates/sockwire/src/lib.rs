//! Top-level facade crate for sockwire.
//!
//! Re-exports the protocol core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use sockwire_core::*;
}

pub mod gateway {
    pub use sockwire_gateway::*;
}
