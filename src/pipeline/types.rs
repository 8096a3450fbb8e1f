//! Record types for the gate pipeline
//!
//! These serialize to the on-disk JSON layout of `execution_log.json` and
//! `latest_run.json`, so field names are part of the external contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Finding severity. Any `Error` blocks the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Approved,
    Blocked,
}

impl DecisionStatus {
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.iter().any(|f| f.severity == Severity::Error) {
            DecisionStatus::Blocked
        } else {
            DecisionStatus::Approved
        }
    }
}

/// Outcome of validating and processing one SQL file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub status: DecisionStatus,
    /// `YYYYMMDDTHHMMSSZ`
    #[serde(rename = "timestamp_utc")]
    pub timestamp: String,
    #[serde(rename = "issues")]
    pub findings: Vec<Finding>,
    /// Always present, `null` when blocked
    #[serde(rename = "backup_file")]
    pub backup_path: Option<String>,
    /// Omitted entirely when blocked
    #[serde(
        rename = "rollback_file",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rollback_path: Option<String>,
    #[serde(rename = "sql_file")]
    pub source_path: String,
}

impl DecisionResult {
    pub fn is_approved(&self) -> bool {
        self.status == DecisionStatus::Approved
    }
}

/// Aggregate outcome of one batch invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "generated_at_utc")]
    pub generated_at: DateTime<Utc>,
    pub total_files: usize,
    #[serde(rename = "approved_files")]
    pub approved_count: usize,
    #[serde(rename = "blocked_files")]
    pub blocked_count: usize,
    pub results: Vec<DecisionResult>,
}

impl RunSummary {
    /// Build a summary, deriving every count from `results`.
    pub fn from_results(generated_at: DateTime<Utc>, results: Vec<DecisionResult>) -> Self {
        let approved_count = results.iter().filter(|r| r.is_approved()).count();
        Self {
            generated_at,
            total_files: results.len(),
            approved_count,
            blocked_count: results.len() - approved_count,
            results,
        }
    }
}
