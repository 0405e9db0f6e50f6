mod domain;
mod probe_result;
mod report;
mod scan;
mod vulnerability;

pub use domain::Domain;
pub use probe_result::{FailureCause, ProbeFailure, ProbeResult, ProbeStatus};
pub use report::{MAX_DISPLAY_SCORE, RiskLevel, ScanReport, ScanSummary, risk_score};
pub use scan::{ScanId, ScanRecord, ScanStatus};
pub use vulnerability::{Severity, Vulnerability};
