use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use codetrack_metrics::SystemMetrics;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};

/// Event types routed by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Periodic system metrics sample (one per tick)
    Metrics,
    /// Coding session report from a tracking client
    Session,
    /// Rolling 7-day total for one client, derived from a session
    WeeklySummary,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::Metrics,
        EventKind::Session,
        EventKind::WeeklySummary,
    ];

    /// Wire tag used in the envelope `type` field and in filter specs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Metrics => "metrics",
            EventKind::Session => "session",
            EventKind::WeeklySummary => "weekly_summary",
        }
    }

    /// Kinds emitted every tick; delivery is counted but not logged per event
    pub fn is_high_frequency(&self) -> bool {
        matches!(self, EventKind::Metrics)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FilterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FilterError::UnknownKind(s.to_string()))
    }
}

/// Envelope sent to subscribers: `{"type", "data", "event_id"}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    data: serde_json::Value,
    event_id: String,
}

impl BroadcastEvent {
    /// Wrap a payload, stamping it with a time-based event id
    pub fn new<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_value(payload)?,
            event_id: Self::timestamp_id(),
        })
    }

    pub fn metrics(metrics: &SystemMetrics) -> Result<Self> {
        Self::new(EventKind::Metrics, metrics)
    }

    pub fn session(session: &CodingSession) -> Result<Self> {
        Self::new(EventKind::Session, session)
    }

    pub fn weekly_summary(summary: &WeeklySummary) -> Result<Self> {
        Self::new(EventKind::WeeklySummary, summary)
    }

    /// Replace the generated event id
    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Serialize the envelope as sent on the wire
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Current UTC time as `YYYYMMDDHHMMSS`
    pub fn timestamp_id() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }
}

/// Coding session reported by an editor plugin
///
/// Missing fields decode to their defaults; a missing duration reads as 0
/// and is rejected at ingestion.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CodingSession {
    pub duration_seconds: i64,
    pub editor: String,
    pub project: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Client-side timestamp, passed through untouched
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_of_code: Option<i64>,
}

/// Rolling total pushed after every accepted session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WeeklySummary {
    pub client: String,
    pub week_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> CodingSession {
        CodingSession {
            duration_seconds: 120,
            editor: "vscode".to_string(),
            project: "codetrack".to_string(),
            language: "rust".to_string(),
            file_path: None,
            timestamp: "2026-10-19T10:00:00Z".to_string(),
            lines_of_code: Some(42),
        }
    }

    #[test]
    fn test_envelope_shape() {
        let event = BroadcastEvent::session(&sample_session())
            .unwrap()
            .with_id("20261019100000");
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "session");
        assert_eq!(json["event_id"], "20261019100000");
        assert_eq!(json["data"]["duration_seconds"], 120);
        assert_eq!(json["data"]["lines_of_code"], 42);
        assert!(json["data"].get("file_path").is_none());
    }

    #[test]
    fn test_weekly_summary_serialization() {
        let summary = WeeklySummary {
            client: "10.0.0.5:51234".to_string(),
            week_seconds: 180,
        };
        let json = BroadcastEvent::weekly_summary(&summary).unwrap().to_json().unwrap();
        assert!(json.contains("\"type\":\"weekly_summary\""));
        assert!(json.contains("\"week_seconds\":180"));
    }

    #[test]
    fn test_event_kind_tags() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "Metrics".parse::<EventKind>(),
            Err(FilterError::UnknownKind("Metrics".to_string()))
        );
        assert!(EventKind::Metrics.is_high_frequency());
        assert!(!EventKind::Session.is_high_frequency());
    }

    #[test]
    fn test_session_deserialize_optional_fields() {
        let raw = r#"{"duration_seconds":30,"editor":"vim","project":"p","language":"go","timestamp":"t"}"#;
        let session: CodingSession = serde_json::from_str(raw).unwrap();
        assert_eq!(session.duration_seconds, 30);
        assert!(session.file_path.is_none());
        assert!(session.lines_of_code.is_none());
    }

    #[test]
    fn test_session_missing_fields_default() {
        let session: CodingSession = serde_json::from_str(r#"{"editor":"zed"}"#).unwrap();
        assert_eq!(session.duration_seconds, 0);
        assert_eq!(session.editor, "zed");
        assert!(session.project.is_empty());

        // Wrong types are still rejected
        assert!(serde_json::from_str::<CodingSession>(r#"{"duration_seconds":"x"}"#).is_err());
        assert!(serde_json::from_str::<CodingSession>("not json").is_err());
    }

    #[test]
    fn test_timestamp_id_format() {
        let id = BroadcastEvent::timestamp_id();
        assert_eq!(id.len(), 14);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
