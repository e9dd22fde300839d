//! Session result records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ItemKind;

/// Outcome of one processed plan item, appended once and never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub status: i32,
    pub time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub unattended: bool,
}

impl OperationResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }

    /// Line written to the operations log for this result
    #[must_use]
    pub fn log_line(&self, kind: ItemKind) -> String {
        let outcome = if self.succeeded() {
            "SUCCESSFUL".to_string()
        } else {
            format!("FAILED with return code: {}", self.status)
        };
        format!(
            "{} of {}-{}: {}",
            kind.log_prefix(),
            self.display_name,
            self.version,
            outcome
        )
    }
}

/// The session report document
///
/// Keys written by other stages of the agent are preserved in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    #[serde(rename = "InstallResults", default)]
    pub install_results: Vec<OperationResult>,
    #[serde(rename = "RemovalResults", default)]
    pub removal_results: Vec<OperationResult>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl SessionReport {
    pub fn record(&mut self, kind: ItemKind, result: OperationResult) {
        match kind {
            ItemKind::Install => self.install_results.push(result),
            ItemKind::Removal => self.removal_results.push(result),
        }
    }
}
