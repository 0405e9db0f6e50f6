use super::{ProgressPublisher, ScanEvent};
use crate::error::PublishError;
use crate::models::ScanId;

/// Writes every event to the log. Used when nobody is watching interactively.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl ProgressPublisher for TracingPublisher {
    fn publish(&self, scan_id: &ScanId, event: ScanEvent) -> Result<(), PublishError> {
        match &event {
            ScanEvent::ScanProgress { progress, message } => {
                tracing::info!(scan_id = %scan_id, progress, "{}", message);
            }
            ScanEvent::ScanComplete { results } => {
                tracing::info!(
                    scan_id = %scan_id,
                    vulnerabilities = results.summary.total,
                    risk_score = results.summary.risk_score,
                    "scan complete"
                );
            }
            ScanEvent::ScanFailed { error } => {
                tracing::error!(scan_id = %scan_id, error = %error, "scan failed");
            }
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            let payload = serde_json::to_string(&event)?;
            tracing::trace!(scan_id = %scan_id, payload = %payload, "event payload");
        }
        Ok(())
    }
}
