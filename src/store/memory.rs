use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

use super::ScanStore;
use crate::error::StoreError;
use crate::models::{ScanId, ScanRecord, ScanReport};

/// In-process store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ScanId, ScanRecord>>,
    reports: RwLock<HashMap<ScanId, ScanReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn save_record(&self, record: &ScanRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_record(&self, id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save_report(&self, report: &ScanReport) -> Result<(), StoreError> {
        match self.reports.write().await.entry(report.scan_id) {
            Entry::Occupied(_) => Err(StoreError::ReportExists(report.scan_id)),
            Entry::Vacant(slot) => {
                slot.insert(report.clone());
                Ok(())
            }
        }
    }

    async fn get_report(&self, id: &ScanId) -> Result<Option<ScanReport>, StoreError> {
        Ok(self.reports.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ResultAggregator;
    use crate::models::{Domain, ScanStatus};

    fn record() -> ScanRecord {
        ScanRecord::new(Domain::parse("example.com").unwrap())
    }

    #[tokio::test]
    async fn test_record_upsert() {
        let store = MemoryStore::new();
        let mut rec = record();
        store.save_record(&rec).await.unwrap();

        rec.begin().unwrap();
        rec.advance(50).unwrap();
        store.save_record(&rec).await.unwrap();

        let loaded = store.get_record(&rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ScanStatus::Scanning);
        assert_eq!(loaded.progress, 50);
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_record(&ScanId::new()).await.unwrap().is_none());
        assert!(store.get_report(&ScanId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_report_written_once() {
        let store = MemoryStore::new();
        let id = ScanId::new();
        let report = ResultAggregator::summarize(id, "example.com", Vec::new(), chrono::Utc::now());

        store.save_report(&report).await.unwrap();
        assert!(matches!(
            store.save_report(&report).await,
            Err(StoreError::ReportExists(dup)) if dup == id
        ));
        assert_eq!(store.get_report(&id).await.unwrap(), Some(report));
    }
}
