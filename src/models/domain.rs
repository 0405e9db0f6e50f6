use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScanError;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A syntactically well-formed hostname, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    pub fn parse(input: &str) -> Result<Self, ScanError> {
        let trimmed = input.trim();
        let normalized = trimmed.strip_suffix('.').unwrap_or(trimmed).to_lowercase();

        if normalized.is_empty() {
            return Err(Self::invalid(input, "domain is empty"));
        }

        if normalized.len() > MAX_DOMAIN_LEN {
            return Err(Self::invalid(input, "domain exceeds 253 characters"));
        }

        if normalized.contains("://") || normalized.contains('/') || normalized.contains(':') {
            return Err(Self::invalid(
                input,
                "expected a bare hostname without scheme, port or path",
            ));
        }

        let labels: Vec<&str> = normalized.split('.').collect();
        if labels.len() < 2 {
            return Err(Self::invalid(input, "expected at least two labels (e.g. example.com)"));
        }

        for label in &labels {
            Self::check_label(input, label)?;
        }

        let tld = labels[labels.len() - 1];
        if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Self::invalid(input, "top-level label must be alphabetic"));
        }

        Ok(Self(normalized))
    }

    fn check_label(input: &str, label: &str) -> Result<(), ScanError> {
        if label.is_empty() {
            return Err(Self::invalid(input, "empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(Self::invalid(input, "label exceeds 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Self::invalid(input, "label cannot start or end with '-'"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Self::invalid(input, "label contains invalid characters"));
        }
        Ok(())
    }

    fn invalid(input: &str, reason: &str) -> ScanError {
        ScanError::InvalidDomain {
            domain: input.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{}", self.0, path)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.0, path)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Domain {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}
