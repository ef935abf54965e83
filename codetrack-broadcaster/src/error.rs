use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid subscription filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Broadcast hub is not running")]
    HubClosed,
}

/// Rejected filter specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown event type '{0}'")]
    UnknownKind(String),

    #[error("filter names no event types")]
    Empty,
}

/// Write failure towards a single subscriber
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("subscriber connection closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected session report
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("session duration must be positive, got {0}")]
    InvalidDuration(i64),

    #[error(transparent)]
    Broadcast(#[from] BroadcasterError),
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
