//! Per-connection heartbeat deadlines.
//!
//! Timers are plain deadlines owned by the connection; the session loop
//! sleeps until [`Heartbeat::next_deadline`] and then polls. Re-arming always
//! replaces the previous deadline, so at most one instance of each timer is
//! ever pending and a replaced deadline can never fire.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// No traffic within the liveness window: close.
    PingTimeout,
    /// Time for the server to send a PING.
    PingInterval,
}

/// Single-shot timer.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Cancel any pending instance, then schedule `after` from `now`.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.cancel();
        self.deadline = Some(now + after);
    }

    /// No-op when unset or already fired.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per arming, when `now` has reached the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The two heartbeat timers of one connection.
#[derive(Debug, Default)]
pub struct Heartbeat {
    ping_timeout: Timer,
    ping_interval: Timer,
}

impl Heartbeat {
    pub fn reset_timeout(&mut self, now: Instant, after: Duration) {
        self.ping_timeout.arm(now, after);
        tracing::trace!(after_ms = millis(after), "ping timeout armed");
    }

    pub fn schedule_ping(&mut self, now: Instant, after: Duration) {
        self.ping_interval.arm(now, after);
        tracing::trace!(after_ms = millis(after), "ping scheduled");
    }

    pub fn cancel_all(&mut self) {
        self.ping_timeout.cancel();
        self.ping_interval.cancel();
    }

    pub fn ping_timeout(&self) -> &Timer {
        &self.ping_timeout
    }

    pub fn ping_interval(&self) -> &Timer {
        &self.ping_interval
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.ping_timeout.deadline(), self.ping_interval.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Consume one due timer. The timeout is reported first when both are due.
    pub fn poll(&mut self, now: Instant) -> Option<TimerKind> {
        if self.ping_timeout.fire(now) {
            return Some(TimerKind::PingTimeout);
        }
        if self.ping_interval.fire(now) {
            return Some(TimerKind::PingInterval);
        }
        None
    }
}

/// Whole milliseconds, saturating.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
