use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use super::{ProgressPublisher, ScanEvent};
use crate::error::PublishError;
use crate::models::ScanId;

const CHANNEL_CAPACITY: usize = 64;

/// One broadcast channel per scan id. Observers join with [`subscribe`](Self::subscribe);
/// the channel is dropped after the scan's terminal event, which ends every stream.
#[derive(Default)]
pub struct BroadcastPublisher {
    channels: Mutex<HashMap<ScanId, broadcast::Sender<ScanEvent>>>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<ScanId, broadcast::Sender<ScanEvent>>> {
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, scan_id: &ScanId) -> broadcast::Receiver<ScanEvent> {
        self.channels()
            .entry(*scan_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drops the scan's channel, ending every open subscription.
    pub fn close(&self, scan_id: &ScanId) {
        self.channels().remove(scan_id);
    }

    pub fn subscriber_count(&self, scan_id: &ScanId) -> usize {
        self.channels()
            .get(scan_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl ProgressPublisher for BroadcastPublisher {
    fn publish(&self, scan_id: &ScanId, event: ScanEvent) -> Result<(), PublishError> {
        let mut channels = self.channels();
        let terminal = event.is_terminal();

        if let Some(tx) = channels.get(scan_id) {
            // No receivers is not an error: nobody is watching this scan right now.
            let delivered = tx.send(event).unwrap_or(0);
            tracing::trace!(scan_id = %scan_id, delivered, "event broadcast");
        }
        if terminal {
            channels.remove(scan_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let publisher = BroadcastPublisher::new();
        let id = ScanId::new();
        let mut rx = publisher.subscribe(&id);

        publisher.publish(&id, ScanEvent::progress(50, "half")).unwrap();
        publisher
            .publish(&id, ScanEvent::ScanFailed { error: "boom".into() })
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), ScanEvent::progress(50, "half"));
        assert!(rx.recv().await.unwrap().is_terminal());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_scans_are_isolated() {
        let publisher = BroadcastPublisher::new();
        let (a, b) = (ScanId::new(), ScanId::new());
        let mut rx_a = publisher.subscribe(&a);
        let _rx_b = publisher.subscribe(&b);

        publisher.publish(&b, ScanEvent::progress(10, "b")).unwrap();
        publisher.publish(&a, ScanEvent::progress(20, "a")).unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), ScanEvent::progress(20, "a"));
        assert_eq!(publisher.subscriber_count(&a), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let publisher = BroadcastPublisher::new();
        assert!(publisher.publish(&ScanId::new(), ScanEvent::progress(1, "x")).is_ok());
    }
}
