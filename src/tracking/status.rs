//! Document status calculation
//!
//! Pure mapping from the four readiness counters to the status label
//! stored on the tracking record.

use serde::{Deserialize, Serialize};

/// Overall document-collection status of one tracking record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "PRE Complete")]
    PreComplete,
    #[serde(rename = "All Complete")]
    AllComplete,
}

impl DocStatus {
    /// Wire string as stored in CRM status fields
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::NotStarted => "Not Started",
            DocStatus::InProgress => "In Progress",
            DocStatus::PreComplete => "PRE Complete",
            DocStatus::AllComplete => "All Complete",
        }
    }

    /// Parse a stored status value (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not started" => Some(DocStatus::NotStarted),
            "in progress" => Some(DocStatus::InProgress),
            "pre complete" => Some(DocStatus::PreComplete),
            "all complete" => Some(DocStatus::AllComplete),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the status label from the readiness counters.
///
/// Precedence:
/// 1. nothing tracked at all → All Complete
/// 2. PRE and FULL both satisfied → All Complete
/// 3. PRE satisfied, FULL pending → PRE Complete
/// 4. nothing received yet → Not Started
/// 5. otherwise → In Progress
pub fn compute_doc_status(
    pre_total: u32,
    pre_received: u32,
    full_total: u32,
    full_received: u32,
) -> DocStatus {
    if pre_total == 0 && full_total == 0 {
        return DocStatus::AllComplete;
    }
    if pre_received >= pre_total && full_received >= full_total {
        return DocStatus::AllComplete;
    }
    if pre_received >= pre_total {
        return DocStatus::PreComplete;
    }
    if pre_received == 0 && full_received == 0 {
        return DocStatus::NotStarted;
    }
    DocStatus::InProgress
}
