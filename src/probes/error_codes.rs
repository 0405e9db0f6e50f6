use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::Probe;
use crate::error::ProbeError;
use crate::http::{HttpClient, PageResponse};
use crate::models::Domain;

pub(super) const NAME: &str = "error_codes";

const VERBOSE_MARKERS: &[(&str, &str)] = &[
    ("python-traceback", r"Traceback \(most recent call last\)"),
    ("java-stacktrace", r"at [\w.$]+\([\w]+\.java:\d+\)"),
    ("java-exception", r"Exception in thread "),
    ("dotnet-error", r"(?i)Microsoft \.NET Framework Version|Server Error in '/' Application"),
    ("php-warning", r"(?i)<b>(?:Warning|Fatal error)</b>:.*on line <b>\d+"),
    ("laravel-debug", r"Whoops, looks like something went wrong|Illuminate\\"),
    ("django-debug", r"You're seeing this error because you have <code>DEBUG = True</code>"),
    ("rails-debug", r"Action Controller: Exception caught"),
    ("node-stack", r"at [\w.<>]+ \(/[^)]+\.js:\d+:\d+\)"),
];

static MARKERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    VERBOSE_MARKERS
        .iter()
        .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (*name, re)))
        .collect()
});

/// Requests a path that cannot exist and inspects how the server fails.
pub struct ErrorCodeProbe {
    client: Arc<HttpClient>,
}

impl ErrorCodeProbe {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    pub fn verbose_markers(page: &PageResponse) -> Vec<&'static str> {
        MARKERS
            .iter()
            .filter(|(_, re)| re.is_match(&page.body))
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn classify(page: &PageResponse) -> serde_json::Value {
        let markers = Self::verbose_markers(page);
        let soft_404 = page.is_success();

        let mut issues = Vec::new();
        if soft_404 {
            issues.push("missing resources answer 200 (soft 404)".to_string());
        }
        if page.status >= 500 {
            issues.push(format!("missing resource triggers server error {}", page.status));
        }
        if !markers.is_empty() {
            issues.push(format!("verbose error output: {}", markers.join(", ")));
        }

        serde_json::json!({
            "url": page.url,
            "status": page.status,
            "soft404": soft_404,
            "verboseMarkers": markers,
            "issues": issues,
        })
    }
}

#[async_trait]
impl Probe for ErrorCodeProbe {
    fn name(&self) -> &str {
        NAME
    }

    fn task(&self) -> &str {
        "Testing error handling"
    }

    async fn probe(&self, domain: &Domain) -> Result<serde_json::Value, ProbeError> {
        let path = format!("/scanward-{}.php", uuid::Uuid::new_v4().simple());
        let page = match self.client.get(&domain.https_url(&path)).await {
            Ok(page) => page,
            Err(_) => self.client.get(&domain.http_url(&path)).await?,
        };
        Ok(Self::classify(&page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::page;

    #[test]
    fn test_clean_404() {
        let resp = page(404, &[], "<h1>Not Found</h1>");
        let result = ErrorCodeProbe::classify(&resp);
        assert_eq!(result["soft404"], false);
        assert!(result["issues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_soft_404() {
        let resp = page(200, &[], "<html>Home</html>");
        let result = ErrorCodeProbe::classify(&resp);
        assert_eq!(result["soft404"], true);
    }

    #[test]
    fn test_stack_trace_detected() {
        let body = "Traceback (most recent call last):\n  File \"app.py\", line 3";
        let resp = page(500, &[], body);
        assert_eq!(ErrorCodeProbe::verbose_markers(&resp), vec!["python-traceback"]);
        let result = ErrorCodeProbe::classify(&resp);
        assert_eq!(result["issues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_java_stack_trace() {
        let body = "java.lang.NullPointerException\n\tat com.acme.web.Handler.run(Handler.java:42)";
        let resp = page(500, &[], body);
        assert!(ErrorCodeProbe::verbose_markers(&resp).contains(&"java-stacktrace"));
    }
}
