use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Install item processing events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    Started {
        item: String,
        version: String,
        installer_type: String,
    },

    /// A disk image was attached for the item
    ImageMounted {
        image: PathBuf,
        mountpoint: PathBuf,
    },

    /// One item copied out of a disk image
    ItemCopied {
        source: PathBuf,
        destination: PathBuf,
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

    /// Cached payload deleted after a successful install
    PayloadEvicted {
        path: PathBuf,
    },
}
