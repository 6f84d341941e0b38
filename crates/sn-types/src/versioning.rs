//! Version numbers and per-activity versioning info.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexDataError;

/// Lifecycle status of a content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStatus {
    Approved,
    Locked,
    Draft,
    Rejected,
    Pending,
}

impl VersionStatus {
    pub fn code(&self) -> char {
        match self {
            VersionStatus::Approved => 'A',
            VersionStatus::Locked => 'L',
            VersionStatus::Draft => 'D',
            VersionStatus::Rejected => 'R',
            VersionStatus::Pending => 'P',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(VersionStatus::Approved),
            "L" => Some(VersionStatus::Locked),
            "D" => Some(VersionStatus::Draft),
            "R" => Some(VersionStatus::Rejected),
            "P" => Some(VersionStatus::Pending),
            _ => None,
        }
    }
}

/// A content version number, text form `V<major>.<minor>.<status>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
    pub status: VersionStatus,
}

impl VersionNumber {
    pub fn new(major: u32, minor: u32, status: VersionStatus) -> Self {
        Self {
            major,
            minor,
            status,
        }
    }

    pub fn is_major(&self) -> bool {
        self.minor == 0
    }

    pub fn is_public(&self) -> bool {
        self.status == VersionStatus::Approved
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}.{}.{}", self.major, self.minor, self.status.code())
    }
}

impl FromStr for VersionNumber {
    type Err = IndexDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexDataError::InvalidVersion(s.to_string());

        let body = s
            .strip_prefix('V')
            .or_else(|| s.strip_prefix('v'))
            .ok_or_else(invalid)?;
        let mut parts = body.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let status = parts
            .next()
            .and_then(|p| VersionStatus::from_code(&p.to_ascii_uppercase()))
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(VersionNumber::new(major, minor, status))
    }
}

/// Versions touched by one indexing activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersioningInfo {
    /// Version ids whose documents are removed.
    #[serde(default)]
    pub delete: Vec<i32>,
    /// Version ids whose documents need their derived flags refreshed.
    #[serde(default)]
    pub reindex: Vec<i32>,
    #[serde(default)]
    pub last_draft_version_id: i32,
    #[serde(default)]
    pub last_public_version_id: i32,
}

impl VersioningInfo {
    pub fn new(last_draft_version_id: i32, last_public_version_id: i32) -> Self {
        Self {
            last_draft_version_id,
            last_public_version_id,
            ..Self::default()
        }
    }

    pub fn with_delete(mut self, version_ids: impl IntoIterator<Item = i32>) -> Self {
        self.delete.extend(version_ids);
        self
    }

    pub fn with_reindex(mut self, version_ids: impl IntoIterator<Item = i32>) -> Self {
        self.reindex.extend(version_ids);
        self
    }

    pub fn is_last_public(&self, version_id: i32) -> bool {
        version_id == self.last_public_version_id
    }

    pub fn is_last_draft(&self, version_id: i32) -> bool {
        version_id == self.last_draft_version_id
    }
}
