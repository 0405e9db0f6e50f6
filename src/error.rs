use std::time::Duration;
use thiserror::Error;

use crate::models::{FailureCause, ScanId, ScanStatus};

/// Operation-level errors surfaced to callers of the coordinator.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("scan {0} not found")]
    NotFound(String),

    #[error("scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ScanId,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("scan {id} failed: {reason}")]
    OrchestrationFailure { id: ScanId, reason: String },

    #[error("probe '{0}' is registered more than once")]
    DuplicateProbe(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Failure of a single probe. Always converted into `ProbeResult` data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("http error: {0}")]
    Http(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("probe panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    pub fn cause(&self) -> FailureCause {
        match self {
            ProbeError::Timeout(_) => FailureCause::Timeout,
            ProbeError::Cancelled => FailureCause::Cancelled,
            ProbeError::Http(_) => FailureCause::Http,
            ProbeError::Network(_) => FailureCause::Network,
            ProbeError::Parse(_) => FailureCause::Parse,
            ProbeError::Panicked(_) => FailureCause::Panicked,
            ProbeError::Other(_) => FailureCause::Other,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ProbeError::Network(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ProbeError::Parse(err.to_string())
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Network(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scan {0} already has a report")]
    ReportExists(ScanId),

    /// The database could not be reached (closed pool, pool timeout, I/O failure).
    #[error("store backend unavailable: {0}")]
    Backend(String),

    #[error("corrupt row: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("progress display closed for scan {0}")]
    Closed(ScanId),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
