#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the mia managed install agent
//!
//! This crate provides the typed plan records consumed by the install
//! engine, the result records it produces, and the version helpers used to
//! match prerequisite tokens.

pub mod item;
pub mod plan;
pub mod reports;
pub mod version;

pub use item::{
    CopySpec, EmbeddedScript, InstallItem, Installer, ItemMeta, RemovalItem, RestartAction,
    ScriptKind, UninstallMethod,
};
pub use mia_errors::codes;
pub use plan::{InstallInfo, PlanEntry, RawPlanItem};
pub use reports::{OperationResult, SessionReport};
pub use version::{normalize_version, split_name_and_version};

use serde::{Deserialize, Serialize};

/// Which plan list an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Install,
    Removal,
}

impl ItemKind {
    /// Prefix used in the operations log and session banners
    #[must_use]
    pub fn log_prefix(self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::Removal => "Removal",
        }
    }
}

/// Post-session action reported to the caller of a full session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    None,
    Restart,
}

impl PostAction {
    /// Process exit code for this action
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Restart => 2,
        }
    }
}
