use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").expect("valid form regex"));
static INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("valid input regex"));
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*\bhref\s*=\s*["']([^"'#]+)["']"#).expect("valid href regex")
});
static SCRIPT_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid script regex")
});
static META_GENERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*name\s*=\s*["']generator["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("valid generator regex")
});

const CSRF_FIELD_HINTS: &[&str] = &[
    "csrf",
    "xsrf",
    "_token",
    "authenticity_token",
    "__requestverificationtoken",
    "nonce",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub action: String,
    pub method: String,
    pub inputs: Vec<String>,
    pub has_password: bool,
    pub has_csrf_token: bool,
    pub autocomplete_off: bool,
}

pub fn attribute(tag_attrs: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?i)\b{}\s*=\s*["']([^"']*)["']"#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .captures(tag_attrs)
        .map(|c| c[1].to_string())
}

pub fn extract_forms(body: &str) -> Vec<Form> {
    FORM_RE
        .captures_iter(body)
        .map(|caps| {
            let attrs = &caps[1];
            let inner = &caps[2];

            let mut inputs = Vec::new();
            let mut has_password = false;
            let mut has_csrf_token = false;
            let mut password_autocomplete_off = false;

            for input in INPUT_RE.captures_iter(inner) {
                let input_attrs = &input[1];
                let name = attribute(input_attrs, "name").unwrap_or_default();
                let input_type = attribute(input_attrs, "type")
                    .unwrap_or_else(|| "text".to_string())
                    .to_lowercase();

                if input_type == "password" {
                    has_password = true;
                    password_autocomplete_off = attribute(input_attrs, "autocomplete")
                        .map(|v| matches!(v.to_lowercase().as_str(), "off" | "new-password"))
                        .unwrap_or(false);
                }

                let lowered = name.to_lowercase();
                if input_type == "hidden" && CSRF_FIELD_HINTS.iter().any(|h| lowered.contains(h)) {
                    has_csrf_token = true;
                }

                if !name.is_empty() {
                    inputs.push(name);
                }
            }

            let form_autocomplete_off = attribute(attrs, "autocomplete")
                .map(|v| v.eq_ignore_ascii_case("off"))
                .unwrap_or(false);

            Form {
                action: attribute(attrs, "action").unwrap_or_default(),
                method: attribute(attrs, "method")
                    .unwrap_or_else(|| "get".to_string())
                    .to_lowercase(),
                inputs,
                has_password,
                has_csrf_token,
                autocomplete_off: form_autocomplete_off || password_autocomplete_off,
            }
        })
        .collect()
}

/// Links that stay on `host`, as absolute or root-relative paths.
pub fn extract_links(body: &str, host: &str) -> Vec<String> {
    let mut links: Vec<String> = HREF_RE
        .captures_iter(body)
        .filter_map(|c| {
            let href = c[1].trim();
            if href.starts_with('/') && !href.starts_with("//") {
                Some(href.to_string())
            } else if let Some(rest) = href
                .strip_prefix("https://")
                .or_else(|| href.strip_prefix("http://"))
            {
                let link_host = rest.split(['/', '?', ':']).next().unwrap_or("");
                (link_host.eq_ignore_ascii_case(host)).then(|| href.to_string())
            } else {
                None
            }
        })
        .collect();
    links.sort();
    links.dedup();
    links
}

pub fn extract_scripts(body: &str) -> Vec<String> {
    SCRIPT_SRC_RE
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn meta_generator(body: &str) -> Option<String> {
    META_GENERATOR_RE
        .captures(body)
        .map(|c| c[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><head><meta name="generator" content="WordPress 6.1"></head>
        <body>
          <a href="/about">About</a>
          <a href="https://example.com/contact">Contact</a>
          <a href="https://other.org/">Elsewhere</a>
          <a href="/about">About again</a>
          <form action="/login" method="POST">
            <input type="text" name="user">
            <input type="password" name="pass">
            <input type="hidden" name="csrf_token" value="abc">
          </form>
          <form action="/search">
            <input name="q">
          </form>
          <script src="/static/jquery-1.12.4.min.js"></script>
        </body></html>
    "#;

    #[test]
    fn test_extract_forms() {
        let forms = extract_forms(LOGIN_PAGE);
        assert_eq!(forms.len(), 2);

        assert_eq!(forms[0].action, "/login");
        assert_eq!(forms[0].method, "post");
        assert!(forms[0].has_password);
        assert!(forms[0].has_csrf_token);
        assert!(!forms[0].autocomplete_off);
        assert_eq!(forms[0].inputs, vec!["user", "pass", "csrf_token"]);

        assert_eq!(forms[1].method, "get");
        assert!(!forms[1].has_password);
    }

    #[test]
    fn test_extract_links_same_host_only() {
        let links = extract_links(LOGIN_PAGE, "example.com");
        assert_eq!(links, vec!["/about", "https://example.com/contact"]);
    }

    #[test]
    fn test_extract_scripts_and_generator() {
        assert_eq!(extract_scripts(LOGIN_PAGE), vec!["/static/jquery-1.12.4.min.js"]);
        assert_eq!(meta_generator(LOGIN_PAGE).as_deref(), Some("WordPress 6.1"));
    }

    #[test]
    fn test_attribute_lookup() {
        assert_eq!(
            attribute(r#" type="password" autocomplete='off'"#, "autocomplete").as_deref(),
            Some("off")
        );
        assert_eq!(attribute(r#" type="text""#, "name"), None);
    }
}
