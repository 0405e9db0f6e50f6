//! Scan lifecycle: create, run the probe set concurrently, aggregate, persist.
//!
//! The coordinator is the single writer of a scan's record. Probes only produce
//! [`ProbeResult`]s; every progress change happens in the join loop of [`ScanCoordinator::run`].

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::analyzer::ResultAggregator;
use crate::config::EngineConfig;
use crate::error::{ProbeError, Result, ScanError};
use crate::models::{Domain, FailureCause, ProbeResult, ScanId, ScanRecord, ScanReport, ScanStatus};
use crate::probes::{self, Probe};
use crate::publish::{ProgressPublisher, ScanEvent};
use crate::store::ScanStore;

const RETRY_BACKOFF_MS: u64 = 500;
const FINAL_SAVE_RETRIES: u32 = 3;

pub struct ScanCoordinator {
    store: Arc<dyn ScanStore>,
    publisher: Arc<dyn ProgressPublisher>,
    probes: Vec<Arc<dyn Probe>>,
    config: EngineConfig,
    running: Mutex<HashMap<ScanId, CancellationToken>>,
}

impl ScanCoordinator {
    /// Fails with [`ScanError::DuplicateProbe`] when two probes share a name, since
    /// report entries are keyed by probe name.
    pub fn new(
        store: Arc<dyn ScanStore>,
        publisher: Arc<dyn ProgressPublisher>,
        probes: Vec<Arc<dyn Probe>>,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut names = HashSet::with_capacity(probes.len());
        if let Some(dup) = probes.iter().find(|p| !names.insert(p.name())) {
            return Err(ScanError::DuplicateProbe(dup.name().to_string()));
        }

        Ok(Self {
            store,
            publisher,
            probes,
            config,
            running: Mutex::new(HashMap::new()),
        })
    }

    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    /// Validates `domain` and persists a Pending record for it.
    pub async fn create_scan(&self, domain: &str) -> Result<ScanId> {
        let domain = Domain::parse(domain)?;
        let record = ScanRecord::new(domain);
        self.store.save_record(&record).await?;
        tracing::info!(scan_id = %record.id, domain = %record.domain, "scan created");
        Ok(record.id)
    }

    /// Creates a scan and runs it in the background, returning its id at once.
    pub async fn start(self: &Arc<Self>, domain: &str) -> Result<ScanId> {
        let id = self.create_scan(domain).await?;
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = coordinator.run(id).await {
                tracing::error!(scan_id = %id, error = %e, "scan did not complete");
            }
        });
        Ok(id)
    }

    /// Runs every probe against the scan's domain and commits the report.
    ///
    /// Probe failures become data in the report. The only error after the scan has
    /// started is a failure to commit the report (the scan ends Failed) or to
    /// persist the final record.
    pub async fn run(&self, id: ScanId) -> Result<()> {
        let token = CancellationToken::new();
        {
            let mut running = self.running();
            if running.contains_key(&id) {
                return Err(ScanError::InvalidTransition {
                    id,
                    from: ScanStatus::Scanning,
                    to: ScanStatus::Scanning,
                });
            }
            running.insert(id, token.clone());
        }

        // The record is read only after the id is reserved, so a run that finished
        // in the meantime is seen as Completed here.
        let outcome = match self.begin(id).await {
            Ok(record) => self.drive(record, token).await,
            Err(e) => Err(e),
        };
        self.running().remove(&id);
        outcome
    }

    async fn begin(&self, id: ScanId) -> Result<ScanRecord> {
        let mut record = self
            .store
            .get_record(&id)
            .await?
            .ok_or_else(|| ScanError::NotFound(id.to_string()))?;
        record.begin()?;
        self.store.save_record(&record).await?;
        Ok(record)
    }

    async fn drive(&self, mut record: ScanRecord, token: CancellationToken) -> Result<()> {
        let id = record.id;
        tracing::info!(scan_id = %id, domain = %record.domain, probes = self.probes.len(), "scan started");
        self.emit(&id, ScanEvent::progress(0, "Initializing scan..."));

        let results = self.run_probes(&mut record, &token).await;
        let report = ResultAggregator::summarize(id, record.domain.as_str(), results, Utc::now());

        if let Err(e) = self.store.save_report(&report).await {
            let reason = format!("failed to save report: {}", e);
            tracing::error!(scan_id = %id, error = %e, "report not committed");
            record.fail(reason.clone())?;
            if let Err(e) = self.store.save_record(&record).await {
                tracing::warn!(scan_id = %id, error = %e, "could not persist failed status");
            }
            self.emit(&id, ScanEvent::ScanFailed { error: reason.clone() });
            return Err(ScanError::OrchestrationFailure { id, reason });
        }

        // The report is committed, so the scan is Completed whatever happens to the
        // status write; observers always get the terminal event.
        record.complete()?;
        let saved = self.save_final_record(&record).await;
        tracing::info!(
            scan_id = %id,
            vulnerabilities = report.summary.total,
            risk_score = report.summary.risk_score,
            "scan completed"
        );
        self.emit(&id, ScanEvent::progress(100, "Scan complete!"));
        self.emit(
            &id,
            ScanEvent::ScanComplete {
                results: Box::new(report),
            },
        );
        saved
    }

    /// Writes the terminal record, retrying with a linear backoff.
    async fn save_final_record(&self, record: &ScanRecord) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.store.save_record(record).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < FINAL_SAVE_RETRIES => {
                    attempt += 1;
                    tracing::warn!(scan_id = %record.id, attempt, error = %e, "final status not saved, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                }
                Err(e) => {
                    tracing::error!(scan_id = %record.id, error = %e, "final status not saved");
                    return Err(e.into());
                }
            }
        }
    }

    /// Fans out the probe set and folds completions into the record, one at a time.
    async fn run_probes(&self, record: &mut ScanRecord, token: &CancellationToken) -> Vec<ProbeResult> {
        let total = self.probes.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_for(total)));
        let domain = Arc::new(record.domain.clone());

        let mut tasks = JoinSet::new();
        let mut slot_of = HashMap::with_capacity(total);
        for (index, probe) in self.probes.iter().enumerate() {
            let handle = tasks.spawn(run_probe(
                Arc::clone(probe),
                Arc::clone(&domain),
                self.config.clone(),
                token.clone(),
                Arc::clone(&semaphore),
            ));
            slot_of.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; total];
        let mut settled = 0usize;

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, result) = match joined {
                Ok((task_id, result)) => (slot_of.get(&task_id).copied(), Some(result)),
                Err(e) => {
                    tracing::error!(scan_id = %record.id, error = %e, "probe task aborted");
                    (slot_of.get(&e.id()).copied(), None)
                }
            };
            let Some(index) = index else { continue };
            let probe = &self.probes[index];

            let result = result.unwrap_or_else(|| {
                ProbeResult::errored(probe.name(), &ProbeError::Other("probe task aborted".into()), 0)
            });
            match &result.error {
                None => tracing::debug!(scan_id = %record.id, probe = probe.name(), ms = result.duration_ms, "probe ok"),
                Some(failure) => tracing::warn!(
                    scan_id = %record.id,
                    probe = probe.name(),
                    cause = ?failure.cause,
                    "probe errored: {}",
                    failure.message
                ),
            }
            slots[index] = Some(result);
            settled += 1;

            let progress = ((100 * settled) as f64 / total as f64).round() as u8;
            if let Err(e) = record.advance(progress) {
                tracing::warn!(scan_id = %record.id, error = %e, "progress not recorded");
            }
            if let Err(e) = self.store.save_record(record).await {
                tracing::warn!(scan_id = %record.id, error = %e, "could not persist progress");
            }
            self.emit(&record.id, ScanEvent::progress(record.progress, probe.task()));
        }

        slots
            .into_iter()
            .zip(&self.probes)
            .map(|(slot, probe)| {
                slot.unwrap_or_else(|| {
                    ProbeResult::errored(probe.name(), &ProbeError::Other("probe never settled".into()), 0)
                })
            })
            .collect()
    }

    /// The committed report. Only a Completed scan has one; Pending, Scanning and
    /// Failed scans yield `NotFound`.
    pub async fn get_report(&self, id: &ScanId) -> Result<ScanReport> {
        let record = self.get_status(id).await?;
        if record.status != ScanStatus::Completed {
            return Err(ScanError::NotFound(id.to_string()));
        }
        self.store
            .get_report(id)
            .await?
            .ok_or_else(|| ScanError::NotFound(id.to_string()))
    }

    /// Status of a scan. A scan whose report was committed but whose final status
    /// write was lost is reported as Completed.
    pub async fn get_status(&self, id: &ScanId) -> Result<ScanRecord> {
        let mut record = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| ScanError::NotFound(id.to_string()))?;
        if record.status == ScanStatus::Scanning
            && !self.is_running(id)
            && self.store.get_report(id).await?.is_some()
        {
            record.status = ScanStatus::Completed;
            record.progress = 100;
        }
        Ok(record)
    }

    /// Signals a running scan to stop. Returns `false` when nothing was cancelled.
    pub fn cancel(&self, id: &ScanId) -> bool {
        match self.running().get(id) {
            Some(token) if !token.is_cancelled() => {
                tracing::info!(scan_id = %id, "cancellation requested");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, id: &ScanId) -> bool {
        self.running().contains_key(id)
    }

    fn running(&self) -> MutexGuard<'_, HashMap<ScanId, CancellationToken>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, id: &ScanId, event: ScanEvent) {
        let kind = event.kind();
        if let Err(e) = self.publisher.publish(id, event) {
            tracing::warn!(scan_id = %id, event = kind, error = %e, "publish failed");
        }
    }
}

/// One probe's unit of work: wait for a slot, then execute with timeout retries.
async fn run_probe(
    probe: Arc<dyn Probe>,
    domain: Arc<Domain>,
    config: EngineConfig,
    token: CancellationToken,
    semaphore: Arc<Semaphore>,
) -> ProbeResult {
    let started = Instant::now();
    let cancelled = |started: Instant| {
        ProbeResult::errored(probe.name(), &ProbeError::Cancelled, started.elapsed().as_millis() as u64)
    };

    let _permit = tokio::select! {
        biased;
        _ = token.cancelled() => return cancelled(started),
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return ProbeResult::errored(
                probe.name(),
                &ProbeError::Other("probe scheduler closed".into()),
                0,
            ),
        },
    };

    let mut attempt: u32 = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => cancelled(started),
            result = probes::execute(probe.as_ref(), &domain, config.probe_timeout) => result,
        };

        if result.failure_cause() != Some(FailureCause::Timeout) || attempt >= config.probe_retries {
            return result;
        }

        attempt += 1;
        tracing::debug!(probe = probe.name(), attempt, "probe timed out, retrying");
        let backoff = Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt));
        tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(started),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}
