use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::{Probe, fetch_landing};
use crate::error::ProbeError;
use crate::http::HttpClient;
use crate::models::Domain;

pub(super) const NAME: &str = "session_management";

const SESSION_HINTS: &[&str] = &["sess", "sid", "auth", "token", "jwt", "login"];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CookieAudit {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    pub session_like: bool,
    pub issues: Vec<String>,
}

/// Audits cookie attributes set by the landing page.
pub struct SessionManagementProbe {
    client: Arc<HttpClient>,
}

impl SessionManagementProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn audit_cookie(header: &str) -> CookieAudit {
        let mut parts = header.split(';');
        let name = parts
            .next()
            .and_then(|kv| kv.split('=').next())
            .unwrap_or("")
            .trim()
            .to_string();

        let mut secure = false;
        let mut http_only = false;
        let mut same_site = None;

        for attr in parts {
            let attr = attr.trim();
            let (key, value) = attr.split_once('=').unwrap_or((attr, ""));
            match key.trim().to_lowercase().as_str() {
                "secure" => secure = true,
                "httponly" => http_only = true,
                "samesite" => same_site = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let lowered = name.to_lowercase();
        let session_like = SESSION_HINTS.iter().any(|h| lowered.contains(h));

        let mut issues = Vec::new();
        if !secure {
            issues.push("missing Secure flag".to_string());
        }
        if !http_only && session_like {
            issues.push("session cookie readable from JavaScript (no HttpOnly)".to_string());
        }
        match same_site.as_deref().map(str::to_lowercase).as_deref() {
            None => issues.push("no SameSite attribute".to_string()),
            Some("none") if !secure => {
                issues.push("SameSite=None without Secure is rejected by browsers".to_string())
            }
            _ => {}
        }

        CookieAudit {
            name,
            secure,
            http_only,
            same_site,
            session_like,
            issues,
        }
    }
}

#[async_trait]
impl Probe for SessionManagementProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Auditing session management"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let landing = fetch_landing(&self.client, domain).await?;
        let cookies: Vec<CookieAudit> = landing
            .set_cookies
            .iter()
            .map(|c| Self::audit_cookie(c))
            .collect();
        let issue_count: usize = cookies.iter().map(|c| c.issues.len()).sum();

        Ok(serde_json::json!({
            "cookies": cookies,
            "issueCount": issue_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardened_cookie_has_no_issues() {
        let audit = SessionManagementProbe::audit_cookie(
            "sessionid=abc123; Path=/; Secure; HttpOnly; SameSite=Lax",
        );
        assert_eq!(audit.name, "sessionid");
        assert!(audit.secure && audit.http_only);
        assert_eq!(audit.same_site.as_deref(), Some("Lax"));
        assert!(audit.session_like);
        assert!(audit.issues.is_empty());
    }

    #[test]
    fn test_weak_session_cookie() {
        let audit = SessionManagementProbe::audit_cookie("PHPSESSID=xyz; path=/");
        assert!(audit.session_like);
        assert_eq!(audit.issues.len(), 3);
    }

    #[test]
    fn test_samesite_none_without_secure() {
        let audit = SessionManagementProbe::audit_cookie("prefs=dark; SameSite=None");
        assert!(!audit.session_like);
        assert!(audit.issues.iter().any(|i| i.contains("SameSite=None")));
    }
}
