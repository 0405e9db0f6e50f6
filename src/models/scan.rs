use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Domain;
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = ScanError;

    /// Unparseable ids can never name a stored scan, so they surface as `NotFound`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ScanError::NotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ScanStatus::Pending),
            "scanning" => Some(ScanStatus::Scanning),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Scanning)
                | (ScanStatus::Scanning, ScanStatus::Completed)
                | (ScanStatus::Scanning, ScanStatus::Failed)
        )
    }
}

/// Lifecycle state of one scan. Mutated only by the coordinator that runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: ScanId,
    pub domain: Domain,
    pub status: ScanStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn new(domain: Domain) -> Self {
        let now = Utc::now();
        Self {
            id: ScanId::new(),
            domain,
            status: ScanStatus::Pending,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn begin(&mut self) -> Result<(), ScanError> {
        self.transition(ScanStatus::Scanning)?;
        self.progress = 0;
        Ok(())
    }

    /// Raises progress; lower values are ignored so progress never goes backwards.
    pub fn advance(&mut self, progress: u8) -> Result<(), ScanError> {
        if self.status.is_terminal() {
            return Err(ScanError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: self.status,
            });
        }
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), ScanError> {
        self.transition(ScanStatus::Completed)?;
        self.progress = 100;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ScanError> {
        self.transition(ScanStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: ScanStatus) -> Result<(), ScanError> {
        if !self.status.can_transition_to(to) {
            return Err(ScanError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
