//! Progress notification for running scans.
//!
//! Publishing is best-effort: the coordinator logs a failed publish and carries on.

mod broadcast;
mod logging;
mod progress_bar;

use serde::Serialize;

use crate::error::PublishError;
use crate::models::{ScanId, ScanReport};

pub use broadcast::BroadcastPublisher;
pub use logging::TracingPublisher;
pub use progress_bar::ProgressBarPublisher;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanProgress { progress: u8, message: String },
    ScanComplete { results: Box<ScanReport> },
    ScanFailed { error: String },
}

impl ScanEvent {
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        ScanEvent::ScanProgress {
            progress,
            message: message.into(),
        }
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::ScanProgress { .. } => "scan_progress",
            ScanEvent::ScanComplete { .. } => "scan_complete",
            ScanEvent::ScanFailed { .. } => "scan_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::ScanProgress { .. })
    }
}

pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, scan_id: &ScanId, event: ScanEvent) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_shape() {
        let event = ScanEvent::progress(44, "Scanning for vulnerabilities");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scan_progress");
        assert_eq!(json["progress"], 44);
        assert_eq!(json["message"], "Scanning for vulnerabilities");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_failed_event_is_terminal() {
        let event = ScanEvent::ScanFailed {
            error: "disk full".into(),
        };
        assert_eq!(event.kind(), "scan_failed");
        assert!(event.is_terminal());
        assert_eq!(serde_json::to_value(&event).unwrap()["error"], "disk full");
    }
}
