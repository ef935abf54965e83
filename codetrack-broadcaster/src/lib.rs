//! Broadcast hub for codetrack metrics and coding sessions
//!
//! This crate fans out metric samples and coding-session reports to a dynamic
//! set of subscribers, each receiving only the event types its filter admits,
//! and keeps a rolling 7-day duration total per reporting client.
//!
//! # Features
//!
//! - Single coordinator task owning the subscriber registry
//! - Serialize-once fan-out with a bounded write deadline per subscriber
//! - Batched removal of subscribers whose write failed
//! - Non-blocking registry snapshots for diagnostics
//! - Sliding-window duration ledger with an injectable clock
//!
//! # Event Types
//!
//! - `metrics` - System metrics sample (high frequency, not logged per event)
//! - `session` - Coding session report
//! - `weekly_summary` - Rolling total for the reporting client
//!
//! Every event is sent as `{"type": ..., "data": ..., "event_id": ...}`.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use codetrack_broadcaster::{
//!     BroadcastHub, ChannelSink, CodingSession, DurationLedger, HubConfig, SessionTracker,
//!     SubscriberId, SubscriptionFilter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = BroadcastHub::spawn(HubConfig::default());
//!     let tracker = SessionTracker::new(hub.clone(), Arc::new(DurationLedger::new()));
//!
//!     // Subscribe to sessions and summaries only
//!     let (sink, mut outbound) = ChannelSink::new("127.0.0.1:50000", 64);
//!     let filter = SubscriptionFilter::parse("session,weekly_summary")?;
//!     hub.register(SubscriberId::next(), Arc::new(sink), filter).await?;
//!
//!     let session = CodingSession {
//!         duration_seconds: 120,
//!         editor: "vscode".to_string(),
//!         project: "codetrack".to_string(),
//!         language: "rust".to_string(),
//!         file_path: None,
//!         timestamp: "2026-10-19T10:00:00Z".to_string(),
//!         lines_of_code: None,
//!     };
//!     let week_seconds = tracker.record_session("10.0.0.5", &session).await?;
//!     assert_eq!(week_seconds, 120);
//!
//!     while let Some(json) = outbound.recv().await {
//!         println!("{}", json);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod filter;
pub mod hub;
pub mod ledger;
pub mod stats;
pub mod tracker;

// Re-exports
pub use client::{ChannelSink, SubscriberId, SubscriberInfo, SubscriberSink};
pub use error::{BroadcasterError, FilterError, IngestError, Result, SinkError};
pub use events::{BroadcastEvent, CodingSession, EventKind, WeeklySummary};
pub use filter::{matches, SubscriptionFilter};
pub use hub::{BroadcastHub, HubConfig, RegistrySnapshot};
pub use ledger::{Clock, DurationLedger, ManualClock, SessionRecord, SystemClock};
pub use stats::DeliveryStats;
pub use tracker::SessionTracker;
