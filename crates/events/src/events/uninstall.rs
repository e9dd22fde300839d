use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Removal item processing events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UninstallEvent {
    Started {
        item: String,
        version: String,
        method: String,
    },

    /// Paths exclusively owned by the packages being removed
    PathsSelected {
        packages: Vec<String>,
        paths: usize,
    },

    PathRemoved {
        path: String,
    },

    /// A path left in place during the directory pass
    PathKept {
        path: String,
        reason: String,
    },

    PostScriptFailed {
        item: String,
        code: i32,
    },

    Completed {
        item: String,
        version: String,
        restart_needed: bool,
    },

    Failed {
        item: String,
        version: String,
        status: i32,
        failure: FailureContext,
    },
}
