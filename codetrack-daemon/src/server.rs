//! HTTP surface: shared state, router and the JSON status endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use codetrack_broadcaster::{BroadcastHub, SessionTracker};

use crate::config::DaemonConfig;
use crate::version::VersionInfo;
use crate::ws;

pub const SERVICE_NAME: &str = "Coding Tracker Server";

/// Shared state handed to every handler as `Arc<AppState>`
pub struct AppState {
    pub config: DaemonConfig,
    pub tracker: SessionTracker,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: DaemonConfig, tracker: SessionTracker) -> Self {
        Self {
            config,
            tracker,
            started_at: Utc::now(),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        self.tracker.hub()
    }
}

/// Assemble the full router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/ws/monitor", get(ws::monitor_handler))
        .route("/ws/external", get(ws::external_handler))
        .route("/ws/subscribe", get(ws::subscribe_handler))
        .route("/ws/track", get(ws::track_handler))
        .with_state(state)
}

pub(crate) fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connected_clients": state.hub().count(),
        "timestamp": rfc3339_now(),
    }))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let clients: BTreeMap<String, String> = state
        .tracker
        .clients()
        .values()
        .map(|info| (info.peer.clone(), info.filter.clone()))
        .collect();
    let weekly_totals: BTreeMap<String, i64> = state.tracker.weekly_totals().into_iter().collect();

    Json(json!({
        "clients": clients,
        "weekly_totals": weekly_totals,
        "delivery": state.hub().stats(),
        "timestamp": rfc3339_now(),
    }))
}

async fn root_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let port = state.config.port;
    let version = VersionInfo::current();

    Json(json!({
        "service": SERVICE_NAME,
        "version": version.version,
        "build": version,
        "endpoints": {
            "monitor": format!("ws://localhost:{}/ws/monitor", port),
            "external": format!("ws://localhost:{}/ws/external", port),
            "subscribe": format!("ws://localhost:{}/ws/subscribe?types=", port),
            "track": format!("ws://localhost:{}/ws/track", port),
            "health": format!("http://localhost:{}/health", port),
            "stats": format!("http://localhost:{}/stats", port),
        },
        "connected_clients": state.hub().count(),
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "timestamp": rfc3339_now(),
    }))
}
