use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::Probe;
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::Domain;

pub(super) const NAME: &str = "network_tls";

const COMMON_PORTS: &[u16] = &[21, 22, 23, 25, 53, 80, 110, 443, 3389];
const PORT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OpenPort {
    pub port: u16,
    pub service: &'static str,
    pub cleartext: bool,
}

/// DNS, TCP reachability of common ports, HTTPS validity and HTTP redirect policy.
pub struct NetworkTlsProbe {
    client: Arc<HttpClient>,
    port_timeout: Duration,
}

impl NetworkTlsProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            port_timeout: PORT_TIMEOUT,
        }
    }

    pub fn service_for(port: u16) -> &'static str {
        match port {
            21 => "ftp",
            22 => "ssh",
            23 => "telnet",
            25 => "smtp",
            53 => "dns",
            80 => "http",
            110 => "pop3",
            443 => "https",
            3389 => "rdp",
            _ => "unknown",
        }
    }

    pub fn is_cleartext(port: u16) -> bool {
        matches!(port, 21 | 23 | 80 | 110)
    }

    pub fn redirects_to_https(page: &PageResponse) -> bool {
        page.is_redirect()
            && page
                .header("location")
                .is_some_and(|loc| loc.to_lowercase().starts_with("https://"))
    }

    async fn resolve(domain: &Domain) -> Result<Vec<IpAddr>, ProbeError> {
        let addrs = tokio::net::lookup_host((domain.as_str(), 443))
            .await
            .map_err(|e| ProbeError::Network(format!("DNS resolution failed: {}", e)))?;

        let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        ips.sort();
        ips.dedup();

        if ips.is_empty() {
            return Err(ProbeError::Network(format!("{} has no addresses", domain)));
        }
        Ok(ips)
    }

    async fn scan_ports(&self, ip: IpAddr) -> Vec<OpenPort> {
        let checks = COMMON_PORTS.iter().map(|&port| async move {
            let open = matches!(
                tokio::time::timeout(self.port_timeout, TcpStream::connect((ip, port))).await,
                Ok(Ok(_))
            );
            open.then(|| OpenPort {
                port,
                service: Self::service_for(port),
                cleartext: Self::is_cleartext(port),
            })
        });

        join_all(checks).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl Probe for NetworkTlsProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Scanning network and TLS configuration"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let addresses = Self::resolve(domain).await?;
        let open_ports = self.scan_ports(addresses[0]).await;

        let tls = match self.client.get(&domain.https_url("/")).await {
            Ok(page) => serde_json::json!({
                "valid": true,
                "status": page.status,
                "hsts": page.header("strict-transport-security").is_some(),
            }),
            Err(e) => serde_json::json!({
                "valid": false,
                "error": e.to_string(),
            }),
        };

        let http_to_https = match self.client.get_raw(&domain.http_url("/")).await {
            Ok(page) => Some(Self::redirects_to_https(&page)),
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "plain http unreachable");
                None
            }
        };

        Ok(serde_json::json!({
            "addresses": addresses,
            "openPorts": open_ports,
            "tls": tls,
            "httpRedirectsToHttps": http_to_https,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::page;

    #[test]
    fn test_redirect_detection() {
        let redirect = page(301, &[("Location", "https://example.com/")], "");
        assert!(NetworkTlsProbe::redirects_to_https(&redirect));

        let same_scheme = page(302, &[("Location", "http://example.com/home")], "");
        assert!(!NetworkTlsProbe::redirects_to_https(&same_scheme));

        let served = page(200, &[], "<html></html>");
        assert!(!NetworkTlsProbe::redirects_to_https(&served));
    }

    #[test]
    fn test_port_classification() {
        assert_eq!(NetworkTlsProbe::service_for(3389), "rdp");
        assert_eq!(NetworkTlsProbe::service_for(8443), "unknown");
        assert!(NetworkTlsProbe::is_cleartext(23));
        assert!(!NetworkTlsProbe::is_cleartext(22));
    }
}
