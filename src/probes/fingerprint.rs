use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::{Probe, fetch_landing, html};
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::Domain;

pub(super) const NAME: &str = "fingerprint";

const COOKIE_MARKERS: &[(&str, &str, &str)] = &[
    ("phpsessid", "PHP", "language"),
    ("jsessionid", "Java", "language"),
    ("asp.net_sessionid", "ASP.NET", "framework"),
    ("laravel_session", "Laravel", "framework"),
    ("csrftoken", "Django", "framework"),
    ("_rails_session", "Ruby on Rails", "framework"),
    ("connect.sid", "Express", "framework"),
];

const BODY_MARKERS: &[(&str, &str, &str)] = &[
    ("wp-content/", "WordPress", "cms"),
    ("/sites/default/files", "Drupal", "cms"),
    ("__NEXT_DATA__", "Next.js", "framework"),
    ("/_nuxt/", "Nuxt", "framework"),
    ("ng-version=", "Angular", "framework"),
    ("data-reactroot", "React", "framework"),
    ("cdn.shopify.com", "Shopify", "ecommerce"),
];

const HEADER_MARKERS: &[(&str, &str, &str)] = &[
    ("cf-ray", "Cloudflare", "cdn"),
    ("x-amz-cf-id", "Amazon CloudFront", "cdn"),
    ("x-vercel-id", "Vercel", "paas"),
    ("x-served-by", "Fastly", "cdn"),
    ("x-drupal-cache", "Drupal", "cms"),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Technology {
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub evidence: String,
}

impl Technology {
    fn new(name: &str, category: &str, version: Option<String>, evidence: String) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            version,
            evidence,
        }
    }
}

/// Identifies the server stack from headers, cookies and page markers.
pub struct FingerprintProbe {
    client: Arc<HttpClient>,
}

impl FingerprintProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn analyze(page: &PageResponse) -> Vec<Technology> {
        let mut found: Vec<Technology> = Vec::new();

        if let Some(server) = page.header("server") {
            let (name, version) = split_product(server);
            found.push(Technology::new(
                &name,
                "web-server",
                version,
                format!("Server: {}", server),
            ));
        }

        if let Some(powered) = page.header("x-powered-by") {
            for part in powered.split(',') {
                let (name, version) = split_product(part.trim());
                found.push(Technology::new(
                    &name,
                    "runtime",
                    version,
                    format!("X-Powered-By: {}", part.trim()),
                ));
            }
        }

        if let Some(generator) = html::meta_generator(&page.body) {
            let (name, version) = split_generator(&generator);
            found.push(Technology::new(
                &name,
                "cms",
                version,
                format!("meta generator: {}", generator),
            ));
        }

        for cookie in &page.set_cookies {
            let cookie_name = cookie.split('=').next().unwrap_or("").trim().to_lowercase();
            for (marker, name, category) in COOKIE_MARKERS {
                if cookie_name == *marker {
                    found.push(Technology::new(
                        name,
                        category,
                        None,
                        format!("cookie {}", cookie_name),
                    ));
                }
            }
        }

        for (marker, name, category) in BODY_MARKERS {
            if page.body.contains(marker) {
                found.push(Technology::new(name, category, None, format!("page marker {}", marker)));
            }
        }

        for (header, name, category) in HEADER_MARKERS {
            if page.headers.contains_key(*header) {
                found.push(Technology::new(name, category, None, format!("header {}", header)));
            }
        }

        let mut seen = std::collections::HashSet::new();
        found.retain(|t| seen.insert(t.name.to_lowercase()));
        found
    }
}

/// Splits `nginx/1.18.0 (Ubuntu)` into `("nginx", Some("1.18.0"))`.
fn split_product(value: &str) -> (String, Option<String>) {
    let token = value.split_whitespace().next().unwrap_or(value);
    match token.split_once('/') {
        Some((name, version)) if !version.is_empty() => (name.to_string(), Some(version.to_string())),
        _ => (token.to_string(), None),
    }
}

/// Splits `WordPress 6.1.1` into `("WordPress", Some("6.1.1"))`.
fn split_generator(value: &str) -> (String, Option<String>) {
    match value.rsplit_once(' ') {
        Some((name, version)) if version.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
            (name.to_string(), Some(version.to_string()))
        }
        _ => (value.to_string(), None),
    }
}

#[async_trait]
impl Probe for FingerprintProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Fingerprinting technologies"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let page = fetch_landing(&self.client, domain).await?;
        let technologies = Self::analyze(&page);

        Ok(serde_json::json!({
            "url": page.url,
            "status": page.status,
            "technologies": technologies,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::page;

    #[test]
    fn test_detects_server_and_runtime() {
        let resp = page(
            200,
            &[("Server", "nginx/1.18.0 (Ubuntu)"), ("X-Powered-By", "PHP/7.4.3")],
            "<html></html>",
        );
        let techs = FingerprintProbe::analyze(&resp);
        assert_eq!(techs[0].name, "nginx");
        assert_eq!(techs[0].version.as_deref(), Some("1.18.0"));
        assert_eq!(techs[1].name, "PHP");
        assert_eq!(techs[1].version.as_deref(), Some("7.4.3"));
    }

    #[test]
    fn test_detects_cms_and_cdn() {
        let resp = page(
            200,
            &[("cf-ray", "7d1"), ("Set-Cookie", "PHPSESSID=abc; path=/")],
            r#"<meta name="generator" content="WordPress 6.1.1"><link href="/wp-content/themes/x.css">"#,
        );
        let techs = FingerprintProbe::analyze(&resp);
        let names: Vec<&str> = techs.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"WordPress"));
        assert!(names.contains(&"Cloudflare"));
        assert!(names.contains(&"PHP"));
        assert_eq!(names.iter().filter(|n| **n == "WordPress").count(), 1);
    }

    #[test]
    fn test_bare_page_has_no_technologies() {
        let resp = page(200, &[], "<html><body>hi</body></html>");
        assert!(FingerprintProbe::analyze(&resp).is_empty());
    }
}
