//! Persistence of scan records and their reports.
//!
//! Records are upserted on every lifecycle change; a report is written at most
//! once per scan and never replaced.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ScanId, ScanRecord, ScanReport};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Inserts or replaces the record keyed by its id.
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError>;

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError>;

    /// Fails with [`StoreError::ReportExists`] if the scan already has a report.
    async fn save_report(&self, report: &ScanReport) -> Result<(), StoreError>;

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError>;
}
