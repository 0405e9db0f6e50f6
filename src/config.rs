use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("scanward/", env!("CARGO_PKG_VERSION"));

/// Tuning knobs for the scan engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for one probe attempt.
    pub probe_timeout: Duration,
    /// Cap on probes in flight per scan. `None` runs the whole probe set at once.
    pub max_concurrency: Option<usize>,
    /// Extra attempts granted to a probe whose previous attempt timed out.
    pub probe_retries: u32,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            max_concurrency: None,
            probe_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_probe_retries(mut self, retries: u32) -> Self {
        self.probe_retries = retries;
        self
    }

    /// Effective in-flight limit for a probe set of `probe_count` entries.
    pub fn concurrency_for(&self, probe_count: usize) -> usize {
        self.max_concurrency
            .map_or(probe_count, |cap| cap.min(probe_count))
            .max(1)
    }
}
