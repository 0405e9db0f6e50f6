use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{ProbeResult, ScanId, Severity, Vulnerability};

/// Upper bound of the display scale; the stored score itself is not clamped.
pub const MAX_DISPLAY_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

impl RiskLevel {
    pub fn from_display_score(score: f64) -> Self {
        if score <= 0.0 {
            RiskLevel::None
        } else if score < 2.5 {
            RiskLevel::Low
        } else if score < 5.0 {
            RiskLevel::Medium
        } else if score < 7.5 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

impl ScanSummary {
    pub fn from_vulnerabilities(vulnerabilities: &[Vulnerability]) -> Self {
        let count = |severity: Severity| {
            vulnerabilities
                .iter()
                .filter(|v| v.severity == severity)
                .count()
        };

        Self::from_counts(
            count(Severity::Critical),
            count(Severity::High),
            count(Severity::Medium),
            count(Severity::Low),
        )
    }

    pub fn from_counts(critical: usize, high: usize, medium: usize, low: usize) -> Self {
        let risk_score = risk_score(critical, high, medium, low);
        Self {
            total: critical + high + medium + low,
            critical,
            high,
            medium,
            low,
            risk_score,
            risk_level: RiskLevel::from_display_score(risk_score.min(MAX_DISPLAY_SCORE)),
        }
    }

    pub fn empty() -> Self {
        Self::from_counts(0, 0, 0, 0)
    }

    /// Risk score clamped to the 0-10 display range.
    pub fn display_score(&self) -> f64 {
        self.risk_score.clamp(0.0, MAX_DISPLAY_SCORE)
    }
}

/// Weighted severity aggregate: `(critical*10 + high*7 + medium*4 + low*1) / 10`.
pub fn risk_score(critical: usize, high: usize, medium: usize, low: usize) -> f64 {
    let weighted = critical as f64 * f64::from(Severity::Critical.weight())
        + high as f64 * f64::from(Severity::High.weight())
        + medium as f64 * f64::from(Severity::Medium.weight())
        + low as f64 * f64::from(Severity::Low.weight());
    weighted / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: ScanId,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub results: BTreeMap<String, ProbeResult>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub summary: ScanSummary,
}

impl ScanReport {
    pub fn errored_probes(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.values().filter(|r| !r.is_ok())
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.vulnerabilities
            .iter()
            .map(|v| v.severity)
            .max_by_key(|s| s.numeric_value())
    }
}
