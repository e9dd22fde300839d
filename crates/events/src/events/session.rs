use std::path::PathBuf;

use mia_types::ItemKind;
use serde::{Deserialize, Serialize};

/// Why an item was not dispatched in this session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// One or more prerequisites were skipped or failed earlier
    Prerequisites { items: Vec<String> },
    /// A skipped item depends on the item being removed
    Dependents { items: Vec<String> },
    /// Unattended session and the item is not marked unattended
    NotUnattended,
    /// Unattended session and a blocking application is running
    BlockingApplications { applications: Vec<String> },
    /// OS installs always run in a dedicated session
    Deferred,
    /// The plan row could not be converted
    InvalidItem { message: String },
}

/// Session lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    Started {
        session_id: String,
        unattended: bool,
        installs: usize,
        removals: usize,
    },

    ItemSkipped {
        kind: ItemKind,
        item: String,
        reason: SkipReason,
    },

    /// Restart aggregation flipped to required
    RestartRequired {
        item: String,
    },

    /// Cancellation observed at an item boundary
    Cancelled {
        kind: ItemKind,
        unprocessed: usize,
    },

    PlanSaved {
        path: PathBuf,
        installs_remaining: usize,
        removals_remaining: usize,
    },

    PlanSaveFailed {
        path: PathBuf,
        error: String,
    },

    Completed {
        session_id: String,
        restart_needed: bool,
        installs_attempted: usize,
        removals_attempted: usize,
    },
}
