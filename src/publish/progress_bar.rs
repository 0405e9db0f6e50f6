use indicatif::{ProgressBar, ProgressStyle};

use super::{ProgressPublisher, ScanEvent};
use crate::error::PublishError;
use crate::models::ScanId;

/// Terminal progress bar for a single in-process scan.
pub struct ProgressBarPublisher {
    bar: ProgressBar,
}

impl ProgressBarPublisher {
    pub fn new(verbose: bool) -> Self {
        let template = if verbose {
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}"
        } else {
            "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}"
        };
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressPublisher for ProgressBarPublisher {
    fn publish(&self, scan_id: &ScanId, event: ScanEvent) -> Result<(), PublishError> {
        if self.bar.is_finished() {
            return Err(PublishError::Closed(*scan_id));
        }
        match event {
            ScanEvent::ScanProgress { progress, message } => {
                self.bar.set_position(u64::from(progress));
                self.bar.set_message(message);
            }
            ScanEvent::ScanComplete { .. } => {
                self.bar.finish_with_message("Scan complete!");
            }
            ScanEvent::ScanFailed { error } => {
                self.bar.abandon_with_message(format!("Scan failed: {}", error));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_tracks_progress_and_closes() {
        let publisher = ProgressBarPublisher::hidden();
        let id = ScanId::new();

        publisher.publish(&id, ScanEvent::progress(33, "Fingerprinting technologies")).unwrap();
        assert_eq!(publisher.position(), 33);

        publisher
            .publish(&id, ScanEvent::ScanFailed { error: "disk full".into() })
            .unwrap();
        assert!(matches!(
            publisher.publish(&id, ScanEvent::progress(40, "late")),
            Err(PublishError::Closed(_))
        ));
    }
}
