use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    Timeout,
    Cancelled,
    Http,
    Network,
    Parse,
    Panicked,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub cause: FailureCause,
    pub message: String,
}

/// Normalized output of one probe invocation.
///
/// `error` is set exactly when `status` is `Errored`; the constructors are the
/// only way this crate builds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub probe_name: String,
    pub status: ProbeStatus,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeFailure>,
    pub duration_ms: u64,
}

impl ProbeResult {
    pub fn ok(probe_name: impl Into<String>, payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            probe_name: probe_name.into(),
            status: ProbeStatus::Ok,
            payload,
            error: None,
            duration_ms,
        }
    }

    pub fn errored(probe_name: impl Into<String>, err: &ProbeError, duration_ms: u64) -> Self {
        Self {
            probe_name: probe_name.into(),
            status: ProbeStatus::Errored,
            payload: serde_json::Value::Null,
            error: Some(ProbeFailure {
                cause: err.cause(),
                message: err.to_string(),
            }),
            duration_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }

    pub fn failure_cause(&self) -> Option<FailureCause> {
        self.error.as_ref().map(|e| e.cause)
    }
}
