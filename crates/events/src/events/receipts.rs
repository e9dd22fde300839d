use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Receipt database maintenance events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReceiptsEvent {
    RebuildStarted {
        forced: bool,
    },

    PackageImported {
        package_id: String,
        paths: usize,
    },

    RebuildCompleted {
        packages: usize,
        duration_ms: u64,
    },

    RebuildFailed {
        failure: FailureContext,
    },

    /// Package rows deleted after a removal
    PackagesForgotten {
        packages: Vec<String>,
    },

    OrphansPruned {
        paths: u64,
    },
}
