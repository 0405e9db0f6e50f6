use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::{Probe, fetch_landing};
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::{Domain, Severity};

pub(super) const NAME: &str = "security_headers";

struct HeaderRule {
    name: &'static str,
    severity: Severity,
    description: &'static str,
    recommendation: &'static str,
}

const SECURITY_HEADERS: &[HeaderRule] = &[
    HeaderRule {
        name: "Strict-Transport-Security",
        severity: Severity::High,
        description: "Browsers may be downgraded to plain HTTP",
        recommendation: "Strict-Transport-Security: max-age=31536000; includeSubDomains",
    },
    HeaderRule {
        name: "Content-Security-Policy",
        severity: Severity::High,
        description: "No policy restricts script and resource origins",
        recommendation: "Define a Content-Security-Policy starting from default-src 'self'",
    },
    HeaderRule {
        name: "X-Frame-Options",
        severity: Severity::Medium,
        description: "Pages can be framed by other origins (clickjacking)",
        recommendation: "X-Frame-Options: DENY or CSP frame-ancestors 'none'",
    },
    HeaderRule {
        name: "X-Content-Type-Options",
        severity: Severity::Medium,
        description: "Browsers may MIME-sniff responses",
        recommendation: "X-Content-Type-Options: nosniff",
    },
    HeaderRule {
        name: "Referrer-Policy",
        severity: Severity::Low,
        description: "Full URLs may leak to third parties via Referer",
        recommendation: "Referrer-Policy: strict-origin-when-cross-origin",
    },
    HeaderRule {
        name: "Permissions-Policy",
        severity: Severity::Low,
        description: "Powerful browser features are not restricted",
        recommendation: "Permissions-Policy: camera=(), microphone=(), geolocation=()",
    },
];

const DISCLOSURE_HEADERS: &[&str] = &["server", "x-powered-by", "x-aspnet-version", "x-generator"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissingHeader {
    pub name: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderAnalysis {
    pub present: Vec<String>,
    pub missing: Vec<MissingHeader>,
    pub disclosed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsts_max_age: Option<u64>,
    pub score: u8,
}

/// Grades the response against the standard browser security headers.
pub struct SecurityHeadersProbe {
    client: Arc<HttpClient>,
}

impl SecurityHeadersProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    fn penalty(severity: Severity) -> u8 {
        match severity {
            Severity::Critical => 20,
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }

    pub fn analyze(page: &PageResponse) -> HeaderAnalysis {
        let mut present = Vec::new();
        let mut missing = Vec::new();
        let mut score: u8 = 100;

        for rule in SECURITY_HEADERS {
            if page.header(rule.name).is_some() {
                present.push(rule.name.to_string());
            } else {
                score = score.saturating_sub(Self::penalty(rule.severity));
                missing.push(MissingHeader {
                    name: rule.name.to_string(),
                    severity: rule.severity,
                    description: rule.description.to_string(),
                    recommendation: rule.recommendation.to_string(),
                });
            }
        }

        let hsts_max_age = page.header("strict-transport-security").and_then(|value| {
            value
                .split(';')
                .find_map(|d| d.trim().strip_prefix("max-age="))
                .and_then(|age| age.trim().trim_matches('"').parse().ok())
        });

        let disclosed = DISCLOSURE_HEADERS
            .iter()
            .filter_map(|h| page.header(h).map(|v| format!("{}: {}", h, v)))
            .collect();

        HeaderAnalysis {
            present,
            missing,
            disclosed,
            hsts_max_age,
            score,
        }
    }
}

#[async_trait]
impl Probe for SecurityHeadersProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Checking security headers"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let page = fetch_landing(&self.client, domain).await?;
        let analysis = Self::analyze(&page);
        serde_json::to_value(analysis).map_err(|e| ProbeError::Parse(e.to_string()))
    }
}
