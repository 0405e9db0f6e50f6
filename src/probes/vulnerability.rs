use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::{Probe, fetch_landing, html};
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::{Domain, Severity, Vulnerability};

pub(super) const NAME: &str = "vulnerability_scan";

static SQL_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(you have an error in your sql syntax|warning: mysql_|unclosed quotation mark after the character string|quoted string not properly terminated|pg_query\(\)|sqlite3?::|sqlstate\[|ora-\d{5}|microsoft ole db provider for sql server)",
    )
    .expect("valid sql error regex")
});

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("valid version regex"));

/// Lightweight heuristics for reflected XSS, SQL error disclosure, CSRF and
/// misconfiguration. The payload's `vulnerabilities` list feeds the report summary.
pub struct VulnerabilityProbe {
    client: Arc<HttpClient>,
}

impl VulnerabilityProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    fn marker() -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        format!("sw{}\"'><i>", &token[..8])
    }

    pub fn check_reflection(page: &PageResponse, marker: &str) -> Option<Vulnerability> {
        page.body.contains(marker).then(|| {
            Vulnerability::high(
                "Reflected Cross-Site Scripting (XSS)",
                format!(
                    "Query parameter content is echoed unencoded into {}",
                    page.url
                ),
            )
            .with_cvss(6.1)
            .with_recommendation("HTML-encode untrusted input on output and deploy a Content-Security-Policy")
        })
    }

    pub fn check_sql_errors(page: &PageResponse) -> Option<Vulnerability> {
        SQL_ERROR_RE.find(&page.body).map(|m| {
            Vulnerability::high(
                "SQL Injection (error-based)",
                format!("Database error leaked after quote injection: '{}'", m.as_str()),
            )
            .with_cvss(8.6)
            .with_recommendation("Use parameterized queries and suppress database errors in responses")
        })
    }

    pub fn check_csrf(forms: &[html::Form]) -> Vec<Vulnerability> {
        forms
            .iter()
            .filter(|f| f.method == "post" && !f.has_csrf_token)
            .map(|f| {
                let target = if f.action.is_empty() { "(self)" } else { f.action.as_str() };
                Vulnerability::medium(
                    "Missing CSRF protection",
                    format!("POST form targeting {} has no anti-CSRF token field", target),
                )
                .with_cvss(4.3)
                .with_recommendation("Add a per-session anti-CSRF token and SameSite cookies")
            })
            .collect()
    }

    pub fn check_directory_listing(page: &PageResponse) -> Option<Vulnerability> {
        let lowered = page.body.to_lowercase();
        (lowered.contains("<title>index of /") || lowered.contains("directory listing for /")).then(
            || {
                Vulnerability::medium(
                    "Directory listing enabled",
                    format!("{} exposes an auto-generated file index", page.url),
                )
                .with_recommendation("Disable autoindex / directory browsing on the web server")
            },
        )
    }

    pub fn check_version_disclosure(page: &PageResponse) -> Vec<Vulnerability> {
        ["server", "x-powered-by", "x-aspnet-version"]
            .iter()
            .filter_map(|header| {
                let value = page.header(header)?;
                VERSION_RE.is_match(value).then(|| {
                    Vulnerability::low(
                        "Software version disclosed",
                        format!("{} header reveals: {}", header, value),
                    )
                    .with_recommendation("Strip version details from response headers")
                })
            })
            .collect()
    }

    pub fn check_transport(page: &PageResponse) -> Option<Vulnerability> {
        page.url.starts_with("http://").then(|| {
            Vulnerability::new(
                Severity::Medium,
                "Site served without HTTPS",
                format!("Landing page was only reachable over plain HTTP at {}", page.url),
            )
            .with_cvss(5.9)
            .with_recommendation("Serve all content over HTTPS and redirect HTTP requests")
        })
    }

    pub fn assess(
        landing: &PageResponse,
        reflected: Option<&PageResponse>,
        marker: &str,
        injected: Option<&PageResponse>,
    ) -> Vec<Vulnerability> {
        let mut findings = Vec::new();

        if let Some(page) = reflected {
            findings.extend(Self::check_reflection(page, marker));
        }
        if let Some(page) = injected {
            findings.extend(Self::check_sql_errors(page));
        }
        findings.extend(Self::check_csrf(&html::extract_forms(&landing.body)));
        findings.extend(Self::check_directory_listing(landing));
        findings.extend(Self::check_version_disclosure(landing));
        findings.extend(Self::check_transport(landing));

        findings
    }

    fn base_url(landing: &PageResponse, domain: &Domain) -> String {
        if landing.url.starts_with("http://") {
            domain.http_url("/")
        } else {
            domain.https_url("/")
        }
    }
}

#[async_trait]
impl Probe for VulnerabilityProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Scanning for vulnerabilities"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let landing = fetch_landing(&self.client, domain).await?;
        let base = Self::base_url(&landing, domain);

        let marker = Self::marker();
        let reflected_url = format!("{}?q={}", base, urlencoding::encode(&marker));
        let injected_url = format!("{}?id={}", base, urlencoding::encode("1'\""));

        let (reflected, injected) = tokio::join!(
            self.client.get(&reflected_url),
            self.client.get(&injected_url)
        );

        let vulnerabilities = Self::assess(&landing, reflected.as_ref().ok(), &marker, injected.as_ref().ok());

        Ok(serde_json::json!({
            "url": landing.url,
            "checks": ["xss", "sqli", "csrf", "directory_listing", "version_disclosure", "transport"],
            "vulnerabilities": vulnerabilities,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::page;

    #[test]
    fn test_reflection_detected() {
        let marker = "swdeadbeef\"'><i>";
        let resp = page(200, &[], &format!("<p>Results for {}</p>", marker));
        let vuln = VulnerabilityProbe::check_reflection(&resp, marker).unwrap();
        assert_eq!(vuln.severity, Severity::High);

        let encoded = page(200, &[], "<p>Results for swdeadbeef&quot;&#39;&gt;&lt;i&gt;</p>");
        assert!(VulnerabilityProbe::check_reflection(&encoded, marker).is_none());
    }

    #[test]
    fn test_sql_error_detected() {
        let resp = page(500, &[], "You have an error in your SQL syntax; check the manual");
        assert!(VulnerabilityProbe::check_sql_errors(&resp).is_some());
        let clean = page(200, &[], "<html>no results</html>");
        assert!(VulnerabilityProbe::check_sql_errors(&clean).is_none());
    }

    #[test]
    fn test_csrf_only_flags_unprotected_post_forms() {
        let body = r#"
            <form method="post" action="/transfer"><input name="amount"></form>
            <form method="post" action="/profile"><input type="hidden" name="csrfmiddlewaretoken" value="x"></form>
            <form action="/search"><input name="q"></form>
        "#;
        let vulns = VulnerabilityProbe::check_csrf(&html::extract_forms(body));
        assert_eq!(vulns.len(), 1);
        assert!(vulns[0].description.contains("/transfer"));
    }

    #[test]
    fn test_assess_combines_checks() {
        let landing = page(
            200,
            &[("Server", "Apache/2.4.41")],
            "<html><title>Index of /files</title></html>",
        );
        let vulns = VulnerabilityProbe::assess(&landing, None, "m", None);
        let titles: Vec<&str> = vulns.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["Directory listing enabled", "Software version disclosed"]);
    }

    #[test]
    fn test_plain_http_landing_flagged() {
        let mut landing = page(200, &[], "");
        landing.url = "http://example.com/".to_string();
        assert!(VulnerabilityProbe::check_transport(&landing).is_some());
    }
}
