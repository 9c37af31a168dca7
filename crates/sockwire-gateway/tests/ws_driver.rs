//! Websocket driver scenarios over a real socket.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use sockwire_core::error::{Result, SockwireError};
use sockwire_gateway::app_state::AppState;
use sockwire_gateway::config::GatewayConfig;
use sockwire_gateway::router::build_router;
use sockwire_gateway::socketio::{BusEvent, EventBus};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct TestBus {
    seen: Mutex<Vec<String>>,
    reject_open: bool,
    fail_events: bool,
    fail_disconnect: bool,
}

impl TestBus {
    fn names(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }
}

impl EventBus for TestBus {
    fn trigger(&self, event: BusEvent<'_>) -> Result<Value> {
        self.seen.lock().unwrap().push(event.name().to_string());
        match event {
            BusEvent::Open { .. } if self.reject_open => Err(SockwireError::rejected("banned")),
            BusEvent::Event { .. } if self.fail_events => {
                Err(SockwireError::Internal("handler blew up".into()))
            }
            BusEvent::Disconnect { .. } if self.fail_disconnect => {
                Err(SockwireError::Internal("disconnect hook failed".into()))
            }
            _ => Ok(Value::Null),
        }
    }
}

async fn spawn_gateway(bus: Arc<TestBus>) -> (SocketAddr, AppState) {
    let state = AppState::new(GatewayConfig::default(), bus).unwrap();
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send(ws: &mut Client, frame: &str) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Next text frame from the server.
async fn recv_text(ws: &mut Client) -> String {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .unwrap();
    match msg {
        Message::Text(t) => t.as_str().to_string(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Text frames received until the server's Close frame.
async fn drain_until_close(ws: &mut Client) -> Vec<String> {
    let mut frames = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Text(t))) => frames.push(t.as_str().to_string()),
            Some(Ok(Message::Close(_))) => return frames,
            Some(Ok(_)) => continue,
            other => panic!("connection ended without a close frame: {other:?}"),
        }
    }
}

async fn wait_for(bus: &TestBus, name: &str, n: usize) {
    for _ in 0..200 {
        if bus.count(name) >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{name} seen {} times, wanted {n}", bus.count(name));
}

#[tokio::test]
async fn handler_error_closes_connection_and_is_counted() {
    let bus = Arc::new(TestBus {
        fail_events: true,
        ..Default::default()
    });
    let (addr, state) = spawn_gateway(bus.clone()).await;
    let mut ws = connect(addr).await;
    let hs: Value = serde_json::from_str(&recv_text(&mut ws).await).unwrap();
    assert!(hs["sid"].is_string());

    send(&mut ws, "40").await;
    assert!(recv_text(&mut ws).await.starts_with("40{\"sid\":"));

    send(&mut ws, r#"421["boom"]"#).await;
    // no ACK for a failed handler
    assert!(drain_until_close(&mut ws).await.is_empty());

    wait_for(&bus, "Close", 1).await;
    let metrics = state.metrics();
    assert_eq!(metrics.handler_errors.get(&[("code", "INTERNAL")]), 1);
    assert_eq!(metrics.closes.get(&[("reason", "handler_error")]), 1);
    assert_eq!(bus.count("Close"), 1);
}

#[tokio::test]
async fn rejected_open_flushes_handshake_before_close() {
    let bus = Arc::new(TestBus {
        reject_open: true,
        ..Default::default()
    });
    let (addr, state) = spawn_gateway(bus.clone()).await;
    let mut ws = connect(addr).await;

    let frames = drain_until_close(&mut ws).await;
    assert_eq!(frames.len(), 1);
    let hs: Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(hs["pingInterval"], 25000);

    wait_for(&bus, "Close", 1).await;
    assert_eq!(bus.names(), vec!["Open".to_string(), "Close".to_string()]);
    assert_eq!(state.metrics().handler_errors.get(&[("code", "REJECTED")]), 1);
    assert_eq!(state.metrics().closes.get(&[("reason", "handler_error")]), 1);
}

#[tokio::test]
async fn disconnect_with_failing_bus_still_closes() {
    let bus = Arc::new(TestBus {
        fail_disconnect: true,
        ..Default::default()
    });
    let (addr, state) = spawn_gateway(bus.clone()).await;
    let mut ws = connect(addr).await;
    recv_text(&mut ws).await;

    send(&mut ws, "41").await;
    assert!(drain_until_close(&mut ws).await.is_empty());

    wait_for(&bus, "Close", 1).await;
    assert_eq!(bus.count("Disconnect"), 1);
    let metrics = state.metrics();
    assert_eq!(metrics.closes.get(&[("reason", "client_disconnect")]), 1);
    assert_eq!(metrics.handler_errors.get(&[("code", "INTERNAL")]), 1);
}

#[tokio::test]
async fn peer_close_publishes_close_once() {
    let bus = Arc::new(TestBus::default());
    let (addr, state) = spawn_gateway(bus.clone()).await;
    let mut ws = connect(addr).await;
    recv_text(&mut ws).await;

    ws.close(None).await.unwrap();

    wait_for(&bus, "Close", 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.count("Close"), 1);
    assert_eq!(state.metrics().closes.get(&[("reason", "transport_closed")]), 1);
    assert_eq!(state.metrics().connections_active.get(&[]), 0);
}
