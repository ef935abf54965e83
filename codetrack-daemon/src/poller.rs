//! Periodic system metrics publisher

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use codetrack_broadcaster::{BroadcastEvent, BroadcastHub, EventKind};
use codetrack_metrics::SystemSampler;

/// Sample host metrics every `interval` and submit them as `metrics` events.
///
/// Ticks where no subscriber's filter admits `metrics` are skipped. The task
/// ends once the hub stops accepting events.
pub fn spawn_metrics_poller(hub: BroadcastHub, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = SystemSampler::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Metrics poller started ({:?} interval)", interval);

        loop {
            ticker.tick().await;

            if !hub.is_running() {
                break;
            }
            if !hub.has_subscriber_for(EventKind::Metrics) {
                continue;
            }

            let metrics = sampler.sample();
            let event = match BroadcastEvent::metrics(&metrics) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Failed to encode metrics sample: {}", e);
                    continue;
                }
            };

            if let Err(e) = hub.submit(event).await {
                debug!("Metrics submit failed: {}", e);
                break;
            }
        }

        info!("Metrics poller stopped");
    })
}
