use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::IngestError;
use crate::events::{BroadcastEvent, CodingSession, WeeklySummary};
use crate::hub::{BroadcastHub, RegistrySnapshot};
use crate::ledger::DurationLedger;

/// Session ingestion path: ledger write, then `session` and `weekly_summary` fan-out
#[derive(Clone)]
pub struct SessionTracker {
    hub: BroadcastHub,
    ledger: Arc<DurationLedger>,
}

impl SessionTracker {
    pub fn new(hub: BroadcastHub, ledger: Arc<DurationLedger>) -> Self {
        Self { hub, ledger }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn ledger(&self) -> &DurationLedger {
        &self.ledger
    }

    /// Accept one session report from `client_key` and return its rolling total
    pub async fn record_session(
        &self,
        client_key: &str,
        session: &CodingSession,
    ) -> Result<i64, IngestError> {
        if session.duration_seconds <= 0 {
            return Err(IngestError::InvalidDuration(session.duration_seconds));
        }

        let week_seconds = self.ledger.add_record(client_key, session.duration_seconds);
        debug!(
            client = client_key,
            editor = %session.editor,
            project = %session.project,
            duration = session.duration_seconds,
            week_seconds,
            "Session recorded"
        );

        self.hub.submit(BroadcastEvent::session(session)?).await?;

        let summary = WeeklySummary {
            client: client_key.to_string(),
            week_seconds,
        };
        self.hub
            .submit(BroadcastEvent::weekly_summary(&summary)?)
            .await?;

        Ok(week_seconds)
    }

    /// Registered subscribers (id -> peer, filter)
    pub fn clients(&self) -> RegistrySnapshot {
        self.hub.snapshot()
    }

    pub fn weekly_totals(&self) -> HashMap<String, i64> {
        self.ledger.get_all_totals()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.count()
    }
}
