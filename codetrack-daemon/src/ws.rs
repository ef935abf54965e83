//! WebSocket endpoints
//!
//! Subscriber connections (`/ws/monitor`, `/ws/external`, `/ws/subscribe`)
//! register a [`ChannelSink`] with the hub and forward its queue to the
//! socket. `/ws/track` ingests coding sessions and acknowledges each one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use codetrack_broadcaster::{
    ChannelSink, CodingSession, EventKind, IngestError, SessionTracker, SubscriberId,
    SubscriptionFilter,
};

use crate::server::{rfc3339_now, AppState};

type SocketWriter = SplitSink<WebSocket, Message>;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    pub types: String,
}

/// Metrics-only subscriber
pub async fn monitor_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let filter = SubscriptionFilter::only([EventKind::Metrics]);
    ws.on_upgrade(move |socket| run_subscriber(socket, peer, filter, state))
}

/// Sessions and weekly summaries for external dashboards
pub async fn external_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let filter = SubscriptionFilter::only([EventKind::Session, EventKind::WeeklySummary]);
    ws.on_upgrade(move |socket| run_subscriber(socket, peer, filter, state))
}

/// Subscriber with a caller-chosen filter (`?types=session,metrics`)
///
/// The filter is validated before the upgrade so a bad spec gets a 400.
pub async fn subscribe_handler(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscribeQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let filter = match SubscriptionFilter::parse(&query.types) {
        Ok(filter) => filter,
        Err(e) => {
            debug!("Rejected subscription from {}: {}", peer, e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| run_subscriber(socket, peer, filter, state)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Session ingestion
pub async fn track_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| run_tracker(socket, peer, state))
}

/// Send one frame, giving up after `deadline`
async fn send_frame(writer: &mut SocketWriter, message: Message, deadline: Duration) -> bool {
    matches!(
        tokio::time::timeout(deadline, writer.send(message)).await,
        Ok(Ok(()))
    )
}

async fn run_subscriber(
    socket: WebSocket,
    peer: SocketAddr,
    filter: SubscriptionFilter,
    state: Arc<AppState>,
) {
    let id = SubscriberId::next();
    let (sink, mut outbound) = ChannelSink::new(peer.to_string(), state.config.hub.client_queue_capacity);
    if let Err(e) = state.hub().register(id, Arc::new(sink), filter).await {
        warn!("Could not register {}: {}", peer, e);
        return;
    }

    let ws_config = &state.config.ws;
    let idle_timeout = Duration::from_secs(ws_config.subscriber_read_timeout_secs);
    let write_timeout = Duration::from_millis(state.config.hub.write_timeout_ms);

    let (mut writer, mut reader) = socket.split();

    let mut ping = tokio::time::interval_at(
        Instant::now() + Duration::from_secs(ws_config.ping_interval_secs),
        Duration::from_secs(ws_config.ping_interval_secs.max(1)),
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let idle = sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    // Sink closed by the hub
                    break;
                };
                if !send_frame(&mut writer, Message::Text(payload.to_string().into()), write_timeout).await {
                    debug!("Write to {} failed", peer);
                    break;
                }
            }

            msg = reader.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Read error from {}: {}", peer, e);
                        break;
                    }
                    // Any inbound frame, pongs included, counts as liveness
                    Some(Ok(_)) => idle.as_mut().reset(Instant::now() + idle_timeout),
                }
            }

            _ = ping.tick() => {
                if !send_frame(&mut writer, Message::Ping(Default::default()), write_timeout).await {
                    break;
                }
            }

            _ = &mut idle => {
                info!("Client {} idle for {:?}, disconnecting", peer, idle_timeout);
                break;
            }
        }
    }

    if let Err(e) = state.hub().unregister(id).await {
        debug!("Unregister {} after disconnect: {}", id, e);
    }
    let _ = writer.close().await;
}

async fn run_tracker(socket: WebSocket, peer: SocketAddr, state: Arc<AppState>) {
    let client_key = peer.ip().to_string();
    info!("Tracking client connected: {}", peer);

    let ws_config = &state.config.ws;
    let idle_timeout = Duration::from_secs(ws_config.track_read_timeout_secs);
    let write_timeout = Duration::from_millis(state.config.hub.write_timeout_ms);

    let (mut writer, mut reader) = socket.split();

    let mut ping = tokio::time::interval_at(
        Instant::now() + Duration::from_secs(ws_config.ping_interval_secs),
        Duration::from_secs(ws_config.ping_interval_secs.max(1)),
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let idle = sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = reader.next() => {
                let raw = match msg {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Tracking client disconnected: {}", peer);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Tracking client unexpected close: {} - {}", peer, e);
                        break;
                    }
                    Some(Ok(_)) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                        continue;
                    }
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);

                let Some(reply) = handle_report(&state.tracker, &client_key, &raw).await else {
                    continue;
                };
                if !send_frame(&mut writer, Message::Text(reply.to_string().into()), write_timeout).await {
                    warn!("Failed to send ack to {}", peer);
                    break;
                }
            }

            _ = ping.tick() => {
                if !send_frame(&mut writer, Message::Ping(Default::default()), write_timeout).await {
                    break;
                }
            }

            _ = &mut idle => {
                info!("Tracking client {} idle for {:?}, disconnecting", peer, idle_timeout);
                break;
            }
        }
    }

    let _ = writer.close().await;
}

/// Process one `/ws/track` message and build the reply, if any
///
/// Unparseable JSON gets an error reply. Non-positive durations are logged
/// and dropped without a reply.
pub async fn handle_report(tracker: &SessionTracker, client_key: &str, raw: &str) -> Option<Value> {
    let session: CodingSession = match serde_json::from_str(raw) {
        Ok(session) => session,
        Err(e) => {
            warn!("JSON parse error from {}: {}", client_key, e);
            return Some(json!({
                "status": "error",
                "error": "Invalid JSON format",
            }));
        }
    };

    match tracker.record_session(client_key, &session).await {
        Ok(week_seconds) => Some(json!({
            "status": "received",
            "timestamp": rfc3339_now(),
            "week_seconds": week_seconds,
        })),
        Err(IngestError::InvalidDuration(duration)) => {
            warn!("Invalid duration from {}: {}", client_key, duration);
            None
        }
        Err(e) => {
            error!("Failed to record session from {}: {}", client_key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetrack_broadcaster::{BroadcastHub, DurationLedger, HubConfig};

    fn tracker() -> SessionTracker {
        SessionTracker::new(
            BroadcastHub::spawn(HubConfig::default()),
            Arc::new(DurationLedger::new()),
        )
    }

    #[tokio::test]
    async fn test_report_acknowledged_with_total() {
        let tracker = tracker();
        let raw = r#"{"duration_seconds":90,"editor":"vscode","project":"p","language":"rust","timestamp":"t"}"#;

        let first = handle_report(&tracker, "10.0.0.5", raw).await.unwrap();
        assert_eq!(first["status"], "received");
        assert_eq!(first["week_seconds"], 90);
        assert!(first["timestamp"].is_string());

        let second = handle_report(&tracker, "10.0.0.5", raw).await.unwrap();
        assert_eq!(second["week_seconds"], 180);
    }

    #[tokio::test]
    async fn test_invalid_json_gets_error_reply() {
        let tracker = tracker();
        let reply = handle_report(&tracker, "10.0.0.5", "{oops").await.unwrap();
        assert_eq!(reply, json!({ "status": "error", "error": "Invalid JSON format" }));
        assert!(tracker.weekly_totals().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_duration_ignored() {
        let tracker = tracker();
        assert!(handle_report(&tracker, "10.0.0.5", r#"{"duration_seconds":0}"#).await.is_none());
        assert!(handle_report(&tracker, "10.0.0.5", r#"{"duration_seconds":-3}"#).await.is_none());
        assert!(tracker.weekly_totals().is_empty());
    }

    #[tokio::test]
    async fn test_closed_hub_yields_no_reply() {
        let tracker = tracker();
        tracker.hub().shutdown().await.unwrap();
        assert!(handle_report(&tracker, "10.0.0.5", r#"{"duration_seconds":5}"#).await.is_none());
    }
}
