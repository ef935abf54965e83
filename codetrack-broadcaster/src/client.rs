use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::SinkError;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque subscriber identity, independent of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Mint a process-unique id (one per connection)
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outbound side of a subscriber connection
///
/// The hub bounds every `send_text` call with its write timeout, so
/// implementations may simply await the underlying write.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Write one serialized envelope
    async fn send_text(&self, payload: Arc<str>) -> Result<(), SinkError>;

    /// Release the connection. Called once when the subscriber is removed.
    async fn close(&self);

    /// Peer description for diagnostics (e.g. remote address)
    fn peer(&self) -> String;
}

/// Sink backed by a bounded queue drained by a connection writer task
///
/// Closing drops the sender, which ends the writer's `recv` loop.
pub struct ChannelSink {
    peer: String,
    tx: Mutex<Option<mpsc::Sender<Arc<str>>>>,
}

impl ChannelSink {
    pub fn new(peer: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            peer: peer.into(),
            tx: Mutex::new(Some(tx)),
        };
        (sink, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.sender().map_or(true, |tx| tx.is_closed())
    }

    fn sender(&self) -> Option<mpsc::Sender<Arc<str>>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SubscriberSink for ChannelSink {
    async fn send_text(&self, payload: Arc<str>) -> Result<(), SinkError> {
        let tx = self.sender().ok_or(SinkError::Closed)?;
        tx.send(payload).await.map_err(|_| SinkError::Closed)
    }

    async fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Diagnostic view of one registered subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberInfo {
    pub peer: String,
    /// Canonical filter spec, `""` meaning all types
    pub filter: String,
}
