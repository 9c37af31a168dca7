//! Socket.IO connection core.
//!
//! One [`Connection`] per transport connection: handshake negotiation, the
//! heartbeat watchdog, and packet dispatch to the event bus. The core only
//! talks to the outside world through two narrow capabilities injected at
//! construction: [`Transport`] (push/close) and [`EventBus`] (notifications).

pub mod bus;
pub mod connection;
pub mod heartbeat;
pub mod transport;

pub use bus::{BusEvent, EventBus, LoggingBus};
pub use connection::{CloseReason, Connection, LifecycleState, Outgoing};
pub use heartbeat::{Heartbeat, Timer, TimerKind};
pub use transport::{ConnId, RequestInfo, Transport};
