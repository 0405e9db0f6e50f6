use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{ProbeResult, ScanId, ScanReport, ScanSummary, Vulnerability};
use crate::probes::VULNERABILITY_PROBE;

/// Folds settled probe results into a report. Pure: no I/O, no clock reads.
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn summarize(
        scan_id: ScanId,
        domain: &str,
        results: Vec<ProbeResult>,
        timestamp: DateTime<Utc>,
    ) -> ScanReport {
        let vulnerabilities = Self::extract_vulnerabilities(&results);
        let summary = ScanSummary::from_vulnerabilities(&vulnerabilities);

        let mut by_name: BTreeMap<String, ProbeResult> = BTreeMap::new();
        for result in results {
            by_name.entry(result.probe_name.clone()).or_insert(result);
        }

        ScanReport {
            scan_id,
            domain: domain.to_string(),
            timestamp,
            results: by_name,
            vulnerabilities,
            summary,
        }
    }

    /// Vulnerabilities reported by the vulnerability probe; empty when it errored
    /// or its payload does not carry a readable list.
    pub fn extract_vulnerabilities(results: &[ProbeResult]) -> Vec<Vulnerability> {
        results
            .iter()
            .find(|r| r.probe_name == VULNERABILITY_PROBE && r.is_ok())
            .and_then(|r| r.payload.get("vulnerabilities"))
            .and_then(|list| serde_json::from_value(list.clone()).ok())
            .unwrap_or_default()
    }
}
