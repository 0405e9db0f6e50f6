#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanward::error::{ProbeError, PublishError, StoreError};
use scanward::models::{ScanId, ScanRecord, ScanReport};
use scanward::probes::{Probe, VULNERABILITY_PROBE};
use scanward::publish::{ProgressPublisher, ScanEvent};
use scanward::store::{MemoryStore, ScanStore};

pub enum Behavior {
    Ok(Value),
    Fail,
    Hang,
    Panic,
    /// Hangs on the first attempt, succeeds afterwards.
    HangOnce,
}

pub struct StubProbe {
    name: String,
    delay: Duration,
    behavior: Behavior,
    attempts: AtomicU32,
    in_flight: Option<Arc<InFlight>>,
}

impl StubProbe {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            behavior,
            attempts: AtomicU32::new(0),
            in_flight: None,
        }
    }

    pub fn ok(name: &str) -> Arc<dyn Probe> {
        Arc::new(Self::new(name, Behavior::Ok(json!({ "probe": name }))))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tracking(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for StubProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> &str {
        &self.name
    }

    async fn probe(&self, _domain: &scanward::Domain) -> Result<Value, ProbeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let _guard = self.in_flight.as_ref().map(|t| t.enter());
        tokio::time::sleep(self.delay).await;

        match &self.behavior {
            Behavior::Ok(payload) => Ok(payload.clone()),
            Behavior::Fail => Err(ProbeError::Network("connection refused".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }
            Behavior::Panic => panic!("stub probe exploded"),
            Behavior::HangOnce => {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(json!({ "attempt": attempt + 1 }))
            }
        }
    }
}

/// Vulnerability probe stub reporting 2 critical, 1 high and 3 low findings.
pub fn vulnerability_probe() -> Arc<dyn Probe> {
    Arc::new(StubProbe::new(
        VULNERABILITY_PROBE,
        Behavior::Ok(json!({
            "vulnerabilities": [
                {"title": "SQL injection", "description": "db error", "severity": "critical"},
                {"title": "SQL injection (search)", "description": "db error", "severity": "critical"},
                {"title": "Reflected XSS", "description": "marker echoed", "severity": "high"},
                {"title": "Server banner", "description": "nginx/1.18", "severity": "low"},
                {"title": "Cookie flags", "description": "no Secure", "severity": "low"},
                {"title": "Directory listing", "description": "/assets/", "severity": "low"}
            ]
        })),
    ))
}

/// Counts concurrent probe executions.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

pub struct InFlightGuard<'a>(&'a InFlight);

impl InFlight {
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(ScanId, ScanEvent)>>,
}

impl RecordingPublisher {
    pub fn events_for(&self, id: &ScanId) -> Vec<ScanEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(scan, _)| scan == id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn progress_for(&self, id: &ScanId) -> Vec<u8> {
        self.events_for(id)
            .into_iter()
            .filter_map(|event| match event {
                ScanEvent::ScanProgress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect()
    }
}

impl ProgressPublisher for RecordingPublisher {
    fn publish(&self, scan_id: &ScanId, event: ScanEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push((*scan_id, event));
        Ok(())
    }
}

/// A publisher that rejects everything.
pub struct BrokenPublisher;

impl ProgressPublisher for BrokenPublisher {
    fn publish(&self, scan_id: &ScanId, _event: ScanEvent) -> Result<(), PublishError> {
        Err(PublishError::Closed(*scan_id))
    }
}

/// Delegates to a memory store but refuses to save reports.
#[derive(Default)]
pub struct FailingReportStore {
    inner: MemoryStore,
}

#[async_trait]
impl ScanStore for FailingReportStore {
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError> {
        self.inner.save_record(record).await
    }

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        self.inner.get_record(id).await
    }

    async fn save_report(&self, _report: &ScanReport) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".into()))
    }

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError> {
        self.inner.get_report(id).await
    }
}

/// Memory store whose second record read stalls after taking its snapshot.
#[derive(Default)]
pub struct SlowSecondReadStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

#[async_trait]
impl ScanStore for SlowSecondReadStore {
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError> {
        self.inner.save_record(record).await
    }

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let snapshot = self.inner.get_record(id).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        snapshot
    }

    async fn save_report(&self, report: &ScanReport) -> Result<(), StoreError> {
        self.inner.save_report(report).await
    }

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError> {
        self.inner.get_report(id).await
    }
}

/// Memory store that rejects every record write once a report has been saved.
#[derive(Default)]
pub struct StatusWriteFailsAfterReport {
    inner: MemoryStore,
    report_saved: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ScanStore for StatusWriteFailsAfterReport {
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError> {
        if self.report_saved.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("down".into()));
        }
        self.inner.save_record(record).await
    }

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        self.inner.get_record(id).await
    }

    async fn save_report(&self, report: &ScanReport) -> Result<(), StoreError> {
        self.inner.save_report(report).await?;
        self.report_saved.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError> {
        self.inner.get_report(id).await
    }
}
