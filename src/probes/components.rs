use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};

use super::{Probe, fetch_landing, html};
use crate::error::ProbeError;
use crate::http::HttpClient;
use crate::models::Domain;

pub(super) const NAME: &str = "component_audit";

struct KnownComponent {
    name: &'static str,
    pattern: &'static str,
    /// First release without publicly known issues; `None` marks an end-of-life line.
    safe_from: Option<&'static str>,
    advisory: &'static str,
}

const KNOWN_COMPONENTS: &[KnownComponent] = &[
    KnownComponent {
        name: "jQuery",
        pattern: r"jquery[.-]?(\d+\.\d+(?:\.\d+)?)",
        safe_from: Some("3.5.0"),
        advisory: "XSS in htmlPrefilter (CVE-2020-11022)",
    },
    KnownComponent {
        name: "Bootstrap",
        pattern: r"bootstrap[/@.-]?(\d+\.\d+(?:\.\d+)?)",
        safe_from: Some("3.4.1"),
        advisory: "XSS in data-target / tooltip (CVE-2019-8331)",
    },
    KnownComponent {
        name: "AngularJS",
        pattern: r"angular(?:js)?[/@.-]?(1\.\d+(?:\.\d+)?)",
        safe_from: None,
        advisory: "AngularJS 1.x is end-of-life and no longer patched",
    },
    KnownComponent {
        name: "Lodash",
        pattern: r"lodash[/@.-]?(\d+\.\d+(?:\.\d+)?)",
        safe_from: Some("4.17.21"),
        advisory: "Prototype pollution / command injection (CVE-2021-23337)",
    },
    KnownComponent {
        name: "Moment.js",
        pattern: r"moment[/@.-]?(\d+\.\d+(?:\.\d+)?)",
        safe_from: Some("2.29.4"),
        advisory: "ReDoS in RFC2822 parsing (CVE-2022-31129)",
    },
];

static COMPILED: LazyLock<Vec<(&'static KnownComponent, Regex)>> = LazyLock::new(|| {
    KNOWN_COMPONENTS
        .iter()
        .filter_map(|c| Regex::new(&format!("(?i){}", c.pattern)).ok().map(|re| (c, re)))
        .collect()
});

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComponentFinding {
    pub name: String,
    pub version: String,
    pub source: String,
    pub outdated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

/// Detects client-side library versions and flags outdated ones.
pub struct ComponentAuditProbe {
    client: Arc<HttpClient>,
}

impl ComponentAuditProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn audit(scripts: &[String]) -> Vec<ComponentFinding> {
        let mut findings: Vec<ComponentFinding> = Vec::new();

        for src in scripts {
            for (component, re) in COMPILED.iter() {
                let Some(caps) = re.captures(src) else {
                    continue;
                };
                let version = caps[1].to_string();
                let outdated = match component.safe_from {
                    Some(safe) => compare_versions(&version, safe) == std::cmp::Ordering::Less,
                    None => true,
                };
                findings.push(ComponentFinding {
                    name: component.name.to_string(),
                    version,
                    source: src.clone(),
                    outdated,
                    advisory: outdated.then(|| component.advisory.to_string()),
                });
            }
        }

        findings.dedup_by(|a, b| a.name == b.name && a.version == b.version);
        findings
    }
}

fn parse_version(v: &str) -> Vec<u32> {
    v.split('.').map(|p| p.parse().unwrap_or(0)).collect()
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let (mut a, mut b) = (parse_version(a), parse_version(b));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a.cmp(&b)
}

#[async_trait]
impl Probe for ComponentAuditProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Auditing third-party components"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let landing = fetch_landing(&self.client, domain).await?;
        let scripts = html::extract_scripts(&landing.body);
        let components = Self::audit(&scripts);
        let outdated = components.iter().filter(|c| c.outdated).count();

        Ok(serde_json::json!({
            "scriptsInspected": scripts.len(),
            "components": components,
            "outdatedCount": outdated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_comparison() {
        use std::cmp::Ordering;
        assert_eq!(compare_versions("1.12.4", "3.5.0"), Ordering::Less);
        assert_eq!(compare_versions("3.5", "3.5.0"), Ordering::Equal);
        assert_eq!(compare_versions("4.17.21", "4.17.4"), Ordering::Greater);
    }

    #[test]
    fn test_audit_flags_outdated() {
        let scripts = vec![
            "/static/jquery-1.12.4.min.js".to_string(),
            "https://cdn.jsdelivr.net/npm/lodash@4.17.21/lodash.min.js".to_string(),
            "https://ajax.googleapis.com/ajax/libs/angularjs/1.8.2/angular.min.js".to_string(),
        ];
        let findings = ComponentAuditProbe::audit(&scripts);

        let jquery = findings.iter().find(|f| f.name == "jQuery").unwrap();
        assert!(jquery.outdated);
        assert_eq!(jquery.version, "1.12.4");

        let lodash = findings.iter().find(|f| f.name == "Lodash").unwrap();
        assert!(!lodash.outdated);
        assert!(lodash.advisory.is_none());

        let angular = findings.iter().find(|f| f.name == "AngularJS").unwrap();
        assert!(angular.outdated);
    }

    #[test]
    fn test_audit_ignores_unknown_scripts() {
        let scripts = vec!["/app.bundle.js".to_string()];
        assert!(ComponentAuditProbe::audit(&scripts).is_empty());
    }
}
