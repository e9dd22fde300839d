use serde::{Deserialize, Serialize};

use crate::{EventMeta, EventSource};
use mia_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation in a later session might succeed.
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod install;
pub mod receipts;
pub mod session;
pub mod uninstall;

pub use general::*;
pub use install::*;
pub use receipts::*;
pub use session::*;
pub use uninstall::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug output)
    General(GeneralEvent),

    /// Session lifecycle: plan loading, gating, restart aggregation
    Session(SessionEvent),

    /// Install item processing
    Install(InstallEvent),

    /// Removal item processing
    Uninstall(UninstallEvent),

    /// Receipt database maintenance
    Receipts(ReceiptsEvent),
}

impl AppEvent {
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Session(_) => EventSource::SESSION,
            Self::Install(_) => EventSource::INSTALL,
            Self::Uninstall(_) => EventSource::UNINSTALL,
            Self::Receipts(_) => EventSource::RECEIPTS,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Install(InstallEvent::Failed { .. })
            | Self::Uninstall(UninstallEvent::Failed { .. })
            | Self::Receipts(ReceiptsEvent::RebuildFailed { .. })
            | Self::Session(SessionEvent::PlanSaveFailed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Install(InstallEvent::PostScriptFailed { .. })
            | Self::Uninstall(
                UninstallEvent::PostScriptFailed { .. } | UninstallEvent::PathKept { .. },
            )
            | Self::Session(SessionEvent::Cancelled { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Receipts(ReceiptsEvent::PackageImported { .. })
            | Self::Uninstall(UninstallEvent::PathRemoved { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}

/// An event paired with the metadata captured when it was emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: AppEvent) -> Self {
        Self { meta, event }
    }

    /// Wrap an event with metadata derived from the event itself
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let meta = EventMeta::new(event.log_level(), event.event_source());
        Self { meta, event }
    }
}
