use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use super::{Probe, fetch_landing, html};
use crate::error::ProbeError;
use crate::models::Domain;
use crate::http::HttpClient;

pub(super) const NAME: &str = "application_mapping";

const COMMON_PATHS: &[&str] = &[
    "/api",
    "/api/v1",
    "/api/v2",
    "/graphql",
    "/swagger.json",
    "/openapi.json",
    "/.well-known/security.txt",
    "/admin",
];

const MAX_LINKS: usize = 100;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RobotsRules {
    pub disallow: Vec<String>,
    pub sitemaps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPath {
    pub path: String,
    pub status: u16,
}

/// Maps the reachable surface: links, forms, robots rules and well-known paths.
pub struct ApplicationMappingProbe {
    client: Arc<HttpClient>,
}

impl ApplicationMappingProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn parse_robots(body: &str) -> RobotsRules {
        let mut rules = RobotsRules::default();

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_lowercase().as_str() {
                "disallow" => rules.disallow.push(value.to_string()),
                "sitemap" => rules.sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        rules.disallow.sort();
        rules.disallow.dedup();
        rules
    }

    async fn discover_paths(&self, domain: &Domain) -> Vec<DiscoveredPath> {
        let requests = COMMON_PATHS.iter().map(|path| async move {
            let page = self.client.get_raw(&domain.https_url(path)).await.ok()?;
            (page.status < 400).then(|| DiscoveredPath {
                path: path.to_string(),
                status: page.status,
            })
        });

        join_all(requests).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl Probe for ApplicationMappingProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Mapping application surface"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let landing = fetch_landing(&self.client, domain).await?;

        let mut links = html::extract_links(&landing.body, domain.as_str());
        links.truncate(MAX_LINKS);
        let forms = html::extract_forms(&landing.body);
        let scripts = html::extract_scripts(&landing.body);

        let robots = match self.client.get(&domain.https_url("/robots.txt")).await {
            Ok(page) if page.is_success() => Some(Self::parse_robots(&page.body)),
            _ => None,
        };

        let discovered = self.discover_paths(domain).await;

        Ok(serde_json::json!({
            "url": landing.url,
            "links": links,
            "forms": forms,
            "scripts": scripts,
            "robots": robots,
            "discoveredPaths": discovered,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robots() {
        let body = "User-agent: *\nDisallow: /admin\nDisallow: /private # secret\nDisallow:\nSitemap: https://example.com/sitemap.xml\nDisallow: /admin\n";
        let rules = ApplicationMappingProbe::parse_robots(body);
        assert_eq!(rules.disallow, vec!["/admin", "/private"]);
        assert_eq!(rules.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn test_parse_empty_robots() {
        assert_eq!(ApplicationMappingProbe::parse_robots(""), RobotsRules::default());
    }
}
