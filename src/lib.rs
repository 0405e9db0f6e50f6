pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod probes;
pub mod publish;
pub mod reporter;
pub mod scanner;
pub mod server;
pub mod store;

pub use analyzer::ResultAggregator;
pub use config::EngineConfig;
pub use error::{ProbeError, PublishError, ScanError, StoreError};
pub use models::{
    Domain, ProbeResult, ProbeStatus, RiskLevel, ScanId, ScanRecord, ScanReport, ScanStatus,
    ScanSummary, Severity, Vulnerability,
};
pub use probes::Probe;
pub use publish::{ProgressPublisher, ScanEvent};
pub use scanner::ScanCoordinator;
pub use store::{MemoryStore, ScanStore, SqliteStore};
