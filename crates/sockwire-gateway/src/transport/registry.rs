//! Connection registry: `ConnId -> outbound queue`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};

use crate::obs::GatewayMetrics;
use crate::socketio::{ConnId, Transport};

/// One socket's outbound side.
#[derive(Clone)]
pub struct SessionHandle {
    pub tx: mpsc::Sender<Message>,
    /// Signalled when the core asks for a hang-up.
    pub closing: Arc<Notify>,
}

/// Registry of live sockets, shared by all session tasks.
pub struct WsTransport {
    sessions: DashMap<ConnId, SessionHandle>,
    seq: AtomicU64,
    metrics: Arc<GatewayMetrics>,
}

impl WsTransport {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            seq: AtomicU64::new(1),
            metrics,
        }
    }

    /// Allocate a fresh connection id.
    pub fn next_id(&self) -> ConnId {
        ConnId(self.seq.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(&self, conn: ConnId, handle: SessionHandle) {
        self.sessions.insert(conn, handle);
    }

    pub fn unregister(&self, conn: ConnId) -> Option<SessionHandle> {
        self.sessions.remove(&conn).map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Transport for WsTransport {
    fn push(&self, conn: ConnId, frame: Bytes) -> bool {
        let Some(handle) = self.sessions.get(&conn) else {
            return false;
        };
        // engine frames are text unless the payload is not UTF-8
        let msg = match String::from_utf8(frame.to_vec()) {
            Ok(s) => Message::Text(s),
            Err(e) => Message::Binary(e.into_bytes()),
        };
        match handle.tx.try_send(msg) {
            Ok(()) => true,
            Err(_) => {
                self.metrics.push_dropped.inc(&[]);
                false
            }
        }
    }

    fn close(&self, conn: ConnId) {
        if let Some(handle) = self.sessions.get(&conn) {
            handle.closing.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WsTransport {
        WsTransport::new(Arc::new(GatewayMetrics::default()))
    }

    #[tokio::test]
    async fn push_queues_text_frames() {
        let t = registry();
        let id = t.next_id();
        let (tx, mut rx) = mpsc::channel(4);
        t.register(id, SessionHandle { tx, closing: Arc::new(Notify::new()) });

        assert!(t.push(id, Bytes::from_static(b"3probe")));
        match rx.recv().await {
            Some(Message::Text(s)) => assert_eq!(s, "3probe"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let t = registry();
        let id = t.next_id();
        let (tx, _rx) = mpsc::channel(1);
        t.register(id, SessionHandle { tx, closing: Arc::new(Notify::new()) });

        assert!(t.push(id, Bytes::from_static(b"2")));
        assert!(!t.push(id, Bytes::from_static(b"2")));
        assert_eq!(t.metrics.push_dropped.get(&[]), 1);
    }

    #[test]
    fn unknown_connection_is_not_delivered() {
        let t = registry();
        assert!(!t.push(ConnId(42), Bytes::from_static(b"2")));
        t.close(ConnId(42));
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn close_wakes_the_session() {
        let t = registry();
        let id = t.next_id();
        let (tx, _rx) = mpsc::channel(1);
        let closing = Arc::new(Notify::new());
        t.register(id, SessionHandle { tx, closing: Arc::clone(&closing) });

        t.close(id);
        // permit is stored even though nobody was waiting yet
        closing.notified().await;
        assert!(t.unregister(id).is_some());
        assert_eq!(t.len(), 0);
    }
}
