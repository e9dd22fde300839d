//! Structured logging integration for events
//!
//! Every event from the library crates becomes one tracing record with
//! structured fields, so the JSON subscriber yields machine-readable session
//! logs.

use mia_events::{
    AppEvent, EventMessage, GeneralEvent, InstallEvent, ReceiptsEvent, SessionEvent,
    UninstallEvent,
};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
#[allow(clippy::too_many_lines)]
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;

    match event {
        AppEvent::Session(session_event) => match session_event {
            SessionEvent::Started {
                session_id,
                unattended,
                installs,
                removals,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id = %session_id,
                    unattended = unattended,
                    installs = installs,
                    removals = removals,
                    "Session started"
                );
            }
            SessionEvent::ItemSkipped { kind, item, reason } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    kind = kind.log_prefix(),
                    item = %item,
                    reason = ?reason,
                    "Item skipped"
                );
            }
            SessionEvent::Cancelled { kind, unprocessed } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    kind = kind.log_prefix(),
                    unprocessed = unprocessed,
                    "Session cancelled"
                );
            }
            SessionEvent::PlanSaveFailed { path, error } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    path = %path.display(),
                    error = %error,
                    "Could not save the residual plan"
                );
            }
            SessionEvent::Completed {
                session_id,
                restart_needed,
                installs_attempted,
                removals_attempted,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    session_id = %session_id,
                    restart_needed = restart_needed,
                    installs_attempted = installs_attempted,
                    removals_attempted = removals_attempted,
                    "Session completed"
                );
            }
            _ => {
                info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?session_event, "Session event");
            }
        },

        AppEvent::Install(install_event) => match install_event {
            InstallEvent::Started {
                item,
                version,
                installer_type,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    installer_type = %installer_type,
                    "Install started"
                );
            }
            InstallEvent::Completed {
                item,
                version,
                restart_needed,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    restart_needed = restart_needed,
                    "Install completed"
                );
            }
            InstallEvent::Failed {
                item,
                version,
                status,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    status = status,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Install failed"
                );
            }
            InstallEvent::PostScriptFailed { item, code } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    code = code,
                    "Postinstall script failed"
                );
            }
            _ => {
                info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?install_event, "Install event");
            }
        },

        AppEvent::Uninstall(uninstall_event) => match uninstall_event {
            UninstallEvent::Started {
                item,
                version,
                method,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    method = %method,
                    "Removal started"
                );
            }
            UninstallEvent::Completed {
                item,
                version,
                restart_needed,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    restart_needed = restart_needed,
                    "Removal completed"
                );
            }
            UninstallEvent::Failed {
                item,
                version,
                status,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    item = %item,
                    version = %version,
                    status = status,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Removal failed"
                );
            }
            UninstallEvent::PathKept { path, reason } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    path = %path,
                    reason = %reason,
                    "Path kept"
                );
            }
            UninstallEvent::PathRemoved { path } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    path = %path,
                    "Path removed"
                );
            }
            _ => {
                info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?uninstall_event, "Removal event");
            }
        },

        AppEvent::Receipts(receipts_event) => match receipts_event {
            ReceiptsEvent::RebuildCompleted {
                packages,
                duration_ms,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    packages = packages,
                    duration_ms = duration_ms,
                    "Receipt database rebuilt"
                );
            }
            ReceiptsEvent::RebuildFailed { failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Receipt database rebuild failed"
                );
            }
            ReceiptsEvent::PackageImported { package_id, paths } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    package_id = %package_id,
                    paths = paths,
                    "Package imported"
                );
            }
            _ => {
                info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?receipts_event, "Receipts event");
            }
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Warning"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    details = ?details,
                    "Error"
                );
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Debug log"
                );
            }
        },
    }
}
