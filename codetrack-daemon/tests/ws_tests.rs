use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use codetrack_broadcaster::{
    BroadcastEvent, BroadcastHub, DurationLedger, HubConfig, SessionTracker,
};
use codetrack_daemon::{build_router, AppState, DaemonConfig};
use codetrack_metrics::SystemMetrics;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (SocketAddr, Arc<AppState>) {
    let tracker = SessionTracker::new(
        BroadcastHub::spawn(HubConfig::default()),
        Arc::new(DurationLedger::new()),
    );
    let state = Arc::new(AppState::new(DaemonConfig::default(), tracker));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{}{}", addr, path)).await.unwrap();
    client
}

/// Registration completes after the handshake, so poll the hub
async fn wait_for_clients(state: &AppState, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.hub().count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_track_session_reaches_external_subscriber() {
    let (addr, state) = start_server().await;
    let mut external = connect(addr, "/ws/external").await;
    wait_for_clients(&state, 1).await;

    let mut tracker = connect(addr, "/ws/track").await;
    let report = json!({
        "duration_seconds": 120,
        "editor": "vscode",
        "project": "codetrack",
        "language": "rust",
        "timestamp": "2026-10-19T10:00:00Z",
    });
    tracker
        .send(Message::text(report.to_string()))
        .await
        .unwrap();

    let ack = next_json(&mut tracker).await;
    assert_eq!(ack["status"], "received");
    assert_eq!(ack["week_seconds"], 120);

    let session = next_json(&mut external).await;
    assert_eq!(session["type"], "session");
    assert_eq!(session["data"]["editor"], "vscode");

    let summary = next_json(&mut external).await;
    assert_eq!(summary["type"], "weekly_summary");
    assert_eq!(summary["data"]["client"], "127.0.0.1");
    assert_eq!(summary["data"]["week_seconds"], 120);
}

#[tokio::test]
async fn test_track_rejects_malformed_json() {
    let (addr, _state) = start_server().await;
    let mut tracker = connect(addr, "/ws/track").await;

    tracker.send(Message::text("{not json")).await.unwrap();
    let reply = next_json(&mut tracker).await;
    assert_eq!(reply, json!({ "status": "error", "error": "Invalid JSON format" }));

    // Connection stays usable
    tracker
        .send(Message::text(json!({ "duration_seconds": 5 }).to_string()))
        .await
        .unwrap();
    let ack = next_json(&mut tracker).await;
    assert_eq!(ack["week_seconds"], 5);
}

#[tokio::test]
async fn test_monitor_receives_only_metrics() {
    let (addr, state) = start_server().await;
    let mut monitor = connect(addr, "/ws/monitor").await;
    wait_for_clients(&state, 1).await;

    let hub = state.hub();
    let session = codetrack_broadcaster::CodingSession {
        duration_seconds: 10,
        ..Default::default()
    };
    hub.submit(BroadcastEvent::session(&session).unwrap()).await.unwrap();
    hub.submit(BroadcastEvent::metrics(&SystemMetrics::default()).unwrap())
        .await
        .unwrap();

    let first = next_json(&mut monitor).await;
    assert_eq!(first["type"], "metrics");
}

#[tokio::test]
async fn test_filtered_subscription_and_disconnect() {
    let (addr, state) = start_server().await;
    let mut client = connect(addr, "/ws/subscribe?types=weekly_summary").await;
    wait_for_clients(&state, 1).await;

    let snapshot = state.hub().snapshot();
    let info = snapshot.values().next().unwrap();
    assert_eq!(info.filter, "weekly_summary");
    assert!(info.peer.starts_with("127.0.0.1:"));

    state
        .tracker
        .record_session("10.1.1.1", &codetrack_broadcaster::CodingSession {
            duration_seconds: 42,
            ..Default::default()
        })
        .await
        .unwrap();
    let summary = next_json(&mut client).await;
    assert_eq!(summary["type"], "weekly_summary");
    assert_eq!(summary["data"]["week_seconds"], 42);

    client.close(None).await.unwrap();
    wait_for_clients(&state, 0).await;
}

#[tokio::test]
async fn test_subscribe_rejects_bad_filter() {
    let (addr, state) = start_server().await;
    let result = connect_async(format!("ws://{}/ws/subscribe?types=nope", addr)).await;
    assert!(result.is_err());
    assert_eq!(state.hub().count(), 0);
}
