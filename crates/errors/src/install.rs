//! Installation error types

use std::borrow::Cow;

use thiserror::Error;

use crate::{codes, UserFacingError};

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error("installer item {item} was not found at {path}")]
    MissingPayload { item: String, path: String },

    #[error("no filesystems mounted from {image}: {message}")]
    MountFailure { image: String, message: String },

    #[error("found nothing to install in {location}")]
    NoInstallableItemFound { location: String },

    #[error("installer type '{installer_type}' is no longer supported")]
    RetiredInstallerType { installer_type: String },

    #[error("unsupported installer type: {installer_type}")]
    UnsupportedInstallerType { installer_type: String },

    #[error("{backend} exited with status {code}")]
    BackendExitNonZero { backend: String, code: i32 },

    #[error("pre-install script for {item} returned {code}")]
    PreScriptFailed { item: String, code: i32 },

    #[error("copy failed: {message}")]
    CopyFailed { message: String },

    #[error("installation cancelled")]
    Cancelled,
}

impl InstallError {
    /// Status code recorded for an item that failed with this error
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::BackendExitNonZero { code, .. } | Self::PreScriptFailed { code, .. } => *code,
            Self::CopyFailed { .. } => codes::COPY_FAILED,
            Self::Cancelled => codes::CANCELLED,
            Self::MissingPayload { .. }
            | Self::MountFailure { .. }
            | Self::NoInstallableItemFound { .. }
            | Self::RetiredInstallerType { .. }
            | Self::UnsupportedInstallerType { .. } => codes::GENERIC_FAILURE,
        }
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingPayload { .. } => {
                Some("The payload will be fetched again during the next update check.")
            }
            Self::RetiredInstallerType { .. } => {
                Some("Re-import the item with a supported installer type.")
            }
            Self::MountFailure { .. } => Some("Verify the disk image is not corrupt."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MissingPayload { .. } | Self::MountFailure { .. } | Self::Cancelled
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingPayload { .. } => "install.missing_payload",
            Self::MountFailure { .. } => "install.mount_failure",
            Self::NoInstallableItemFound { .. } => "install.nothing_installable",
            Self::RetiredInstallerType { .. } => "install.retired_type",
            Self::UnsupportedInstallerType { .. } => "install.unsupported_type",
            Self::BackendExitNonZero { .. } => "install.backend_failed",
            Self::PreScriptFailed { .. } => "install.prescript_failed",
            Self::CopyFailed { .. } => "install.copy_failed",
            Self::Cancelled => "install.cancelled",
        };
        Some(code)
    }
}
