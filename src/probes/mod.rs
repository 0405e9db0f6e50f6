//! Probe capability and the built-in probe set.
//!
//! A probe inspects one aspect of a target domain and returns a JSON payload.
//! [`execute`] is the isolation boundary: whatever a probe does (error out, hang,
//! panic), the caller always receives a [`ProbeResult`].

mod authentication;
mod components;
mod error_codes;
mod fingerprint;
mod headers;
mod html;
mod mapping;
mod network;
mod session;
mod vulnerability;

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::{Domain, ProbeResult};

pub use authentication::AuthenticationProbe;
pub use components::ComponentAuditProbe;
pub use error_codes::ErrorCodeProbe;
pub use fingerprint::FingerprintProbe;
pub use headers::SecurityHeadersProbe;
pub use mapping::ApplicationMappingProbe;
pub use network::NetworkTlsProbe;
pub use session::SessionManagementProbe;
pub use vulnerability::VulnerabilityProbe;

/// Name of the probe whose payload carries the scan's vulnerability list.
pub const VULNERABILITY_PROBE: &str = vulnerability::NAME;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable key under which the result appears in the report.
    fn name(&self) -> &str;

    /// Human-readable task, published as progress message.
    fn task(&self) -> &str;

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError>;
}

/// Runs one probe attempt under `timeout`, converting every failure into data.
pub async fn execute(probe: &dyn Probe, domain: &Domain, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    let attempt = AssertUnwindSafe(tokio::time::timeout(timeout, probe.probe(domain)))
        .catch_unwind()
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match attempt {
        Ok(Ok(Ok(payload))) => ProbeResult::ok(probe.name(), payload, duration_ms),
        Ok(Ok(Err(err))) => ProbeResult::errored(probe.name(), &err, duration_ms),
        Ok(Err(_)) => ProbeResult::errored(probe.name(), &ProbeError::Timeout(timeout), duration_ms),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ProbeResult::errored(probe.name(), &ProbeError::Panicked(message), duration_ms)
        }
    }
}

/// The nine standard probes, sharing one HTTP client.
pub fn builtin_probes(client: Arc<HttpClient>) -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(FingerprintProbe::new(client.clone())),
        Arc::new(NetworkTlsProbe::new(client.clone())),
        Arc::new(ApplicationMappingProbe::new(client.clone())),
        Arc::new(VulnerabilityProbe::new(client.clone())),
        Arc::new(ComponentAuditProbe::new(client.clone())),
        Arc::new(SessionManagementProbe::new(client.clone())),
        Arc::new(AuthenticationProbe::new(client.clone())),
        Arc::new(ErrorCodeProbe::new(client.clone())),
        Arc::new(SecurityHeadersProbe::new(client)),
    ]
}

/// Fetches the landing page over HTTPS, falling back to plain HTTP.
pub(crate) async fn fetch_landing(
    client: &HttpClient,
    domain: &Domain,
) -> Result<PageResponse, ProbeError> {
    match client.get(&domain.https_url("/")).await {
        Ok(page) => Ok(page),
        Err(https_err) => {
            tracing::debug!(domain = %domain, error = %https_err, "https fetch failed, trying http");
            client.get(&domain.http_url("/")).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe {
        outcome: Result<serde_json::Value, ProbeError>,
        delay: Duration,
    }

    #[async_trait]
    impl Probe for StaticProbe {
        fn name(&self) -> &str {
            "static"
        }

        fn task(&self) -> &str {
            "Static probe"
        }

        async fn probe(&self, _domain: &Domain) -> Result<serde_json::Value, ProbeError> {
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn name(&self) -> &str {
            "panics"
        }

        fn task(&self) -> &str {
            "Panicking probe"
        }

        async fn probe(&self, _domain: &Domain) -> Result<serde_json::Value, ProbeError> {
            panic!("parser blew up");
        }
    }

    fn domain() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    #[tokio::test]
    async fn test_execute_success() {
        let probe = StaticProbe {
            outcome: Ok(serde_json::json!({"ok": true})),
            delay: Duration::ZERO,
        };
        let result = execute(&probe, &domain(), Duration::from_secs(1)).await;
        assert!(result.is_ok());
        assert_eq!(result.probe_name, "static");
        assert_eq!(result.payload["ok"], true);
    }

    #[tokio::test]
    async fn test_execute_captures_error() {
        let probe = StaticProbe {
            outcome: Err(ProbeError::Http("502 bad gateway".into())),
            delay: Duration::ZERO,
        };
        let result = execute(&probe, &domain(), Duration::from_secs(1)).await;
        assert_eq!(result.failure_cause(), Some(crate::models::FailureCause::Http));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let probe = StaticProbe {
            outcome: Ok(serde_json::json!({})),
            delay: Duration::from_secs(60),
        };
        let result = execute(&probe, &domain(), Duration::from_secs(2)).await;
        assert_eq!(result.failure_cause(), Some(crate::models::FailureCause::Timeout));
    }

    #[tokio::test]
    async fn test_execute_catches_panic() {
        let result = execute(&PanickingProbe, &domain(), Duration::from_secs(1)).await;
        assert_eq!(result.failure_cause(), Some(crate::models::FailureCause::Panicked));
        assert!(result.error.unwrap().message.contains("parser blew up"));
    }

    #[test]
    fn test_builtin_probe_names_are_unique() {
        let client = Arc::new(HttpClient::new(Duration::from_secs(1), "test").unwrap());
        let probes = builtin_probes(client);
        assert_eq!(probes.len(), 9);
        let mut names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&VULNERABILITY_PROBE));
    }
}
