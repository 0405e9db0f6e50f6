use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use super::{Probe, html};
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::Domain;

pub(super) const NAME: &str = "authentication";

const LOGIN_PATHS: &[&str] = &["/", "/login", "/signin", "/admin", "/user/login", "/wp-login.php"];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginSurface {
    pub url: String,
    pub status: u16,
    pub password_form: bool,
    pub insecure_transport: bool,
    pub autocomplete_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_challenge: Option<String>,
    pub issues: Vec<String>,
}

/// Looks for login surfaces and how credentials are collected.
pub struct AuthenticationProbe {
    client: Arc<HttpClient>,
}

impl AuthenticationProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// `None` when the page offers no way to authenticate.
    pub fn inspect(page: &PageResponse) -> Option<LoginSurface> {
        let forms = html::extract_forms(&page.body);
        let password_forms: Vec<&html::Form> = forms.iter().filter(|f| f.has_password).collect();
        let challenge = page.header("www-authenticate").map(str::to_string);

        if password_forms.is_empty() && challenge.is_none() {
            return None;
        }

        let insecure_transport = page.url.starts_with("http://")
            || password_forms
                .iter()
                .any(|f| f.action.to_lowercase().starts_with("http://"));
        let autocomplete_enabled = password_forms.iter().any(|f| !f.autocomplete_off);

        let mut issues = Vec::new();
        if insecure_transport {
            issues.push("credentials submitted over plain HTTP".to_string());
        }
        if autocomplete_enabled {
            issues.push("password field allows browser autocomplete".to_string());
        }
        if let Some(scheme) = &challenge {
            if scheme.to_lowercase().starts_with("basic") {
                issues.push("HTTP Basic authentication sends reusable credentials".to_string());
            }
        }

        Some(LoginSurface {
            url: page.url.clone(),
            status: page.status,
            password_form: !password_forms.is_empty(),
            insecure_transport,
            autocomplete_enabled,
            auth_challenge: challenge,
            issues,
        })
    }
}

#[async_trait]
impl Probe for AuthenticationProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Auditing authentication"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let fetches = LOGIN_PATHS
            .iter()
            .map(|path| async move { self.client.get(&domain.https_url(path)).await });
        let pages = join_all(fetches).await;

        if pages.iter().all(|p| p.is_err()) {
            return Err(pages
                .into_iter()
                .find_map(Result::err)
                .unwrap_or_else(|| ProbeError::Other("no login paths reachable".to_string())));
        }

        let mut surfaces: Vec<LoginSurface> = pages
            .iter()
            .filter_map(|p| p.as_ref().ok())
            .filter_map(Self::inspect)
            .collect();
        surfaces.sort_by(|a, b| a.url.cmp(&b.url));
        surfaces.dedup_by(|a, b| a.url == b.url);

        let issue_count: usize = surfaces.iter().map(|s| s.issues.len()).sum();

        Ok(serde_json::json!({
            "pathsChecked": LOGIN_PATHS,
            "loginSurfaces": surfaces,
            "issueCount": issue_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::page;

    #[test]
    fn test_page_without_login_is_ignored() {
        let resp = page(200, &[], "<html><form><input name='q'></form></html>");
        assert!(AuthenticationProbe::inspect(&resp).is_none());
    }

    #[test]
    fn test_password_form_with_autocomplete() {
        let resp = page(
            200,
            &[],
            r#"<form method="post" action="/session"><input type="password" name="pw"></form>"#,
        );
        let surface = AuthenticationProbe::inspect(&resp).unwrap();
        assert!(surface.password_form);
        assert!(surface.autocomplete_enabled);
        assert!(!surface.insecure_transport);
        assert_eq!(surface.issues.len(), 1);
    }

    #[test]
    fn test_insecure_basic_auth() {
        let mut resp = page(401, &[("WWW-Authenticate", "Basic realm=\"admin\"")], "");
        resp.url = "http://example.com/admin".to_string();
        let surface = AuthenticationProbe::inspect(&resp).unwrap();
        assert!(!surface.password_form);
        assert!(surface.insecure_transport);
        assert_eq!(surface.issues.len(), 2);
    }
}
