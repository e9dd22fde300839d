#![warn(clippy::pedantic)]
#![deny(clippy::all)]

//! Managed install and removal sessions for mia
//!
//! This crate processes the install plan: removals first, then installs,
//! with prerequisite and dependent cascades, unattended gating, payload
//! cache eviction and a residual plan for the next session.

#[macro_use]
mod macros;
mod api;
pub mod cache;
mod copy;
mod installer;
pub mod log;
pub mod plan;
pub mod prereqs;
mod removal;
pub mod report;
mod scripts;
mod session;
mod uninstaller;

pub use copy::{copy_items_from_mountpoint, remove_copied_items};
pub use installer::{InstallDispatcher, ItemOutcome};
pub use log::OperationsLog;
pub use removal::{remove_filesystem_items, RemovalReport};
pub use session::ManagedInstaller;
pub use uninstaller::UninstallDispatcher;

// Re-export the public API surface from api module
pub use api::config::InstallConfig;
pub use api::context::SessionContext;
pub use api::result::SessionOutcome;

// Re-export EventSender for use by macros and contexts
pub use mia_events::EventSender;
