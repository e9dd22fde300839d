//! Removal error types

use std::borrow::Cow;

use thiserror::Error;

use crate::{codes, UserFacingError};

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum UninstallError {
    #[error("no packages declared for removal")]
    NoPackagesDeclared,

    #[error("could not initialize receipt database: {message}")]
    ReceiptDatabaseUnavailable { message: String },

    #[error("{package} not found in receipt database")]
    PackageNotInDatabase { package: String },

    #[error("uninstaller package for {item} was missing from the cache: {path}")]
    MissingUninstallerPayload { item: String, path: String },

    #[error("invalid removal spec: {message}")]
    MissingRemovalSpec { message: String },

    #[error("removal error for {path}: {message}")]
    RemovalFailed { path: String, message: String },

    #[error("uninstall method '{method}' is no longer supported")]
    RetiredUninstallMethod { method: String },

    #[error("'{method}' is not a valid uninstall method")]
    UnsupportedUninstallMethod { method: String },

    #[error("{backend} exited with status {code}")]
    BackendExitNonZero { backend: String, code: i32 },

    #[error("pre-uninstall script for {item} returned {code}")]
    PreScriptFailed { item: String, code: i32 },

    #[error("uninstall cancelled")]
    Cancelled,
}

impl UninstallError {
    /// Status code recorded for an item that failed with this error
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::NoPackagesDeclared => codes::NO_PACKAGES_DECLARED,
            Self::ReceiptDatabaseUnavailable { .. } => codes::RECEIPT_DB_UNAVAILABLE,
            Self::PackageNotInDatabase { .. } => codes::PACKAGE_NOT_IN_DATABASE,
            Self::MissingRemovalSpec { .. } | Self::RemovalFailed { .. } => codes::COPY_FAILED,
            Self::BackendExitNonZero { code, .. } | Self::PreScriptFailed { code, .. } => *code,
            Self::Cancelled => codes::CANCELLED,
            Self::MissingUninstallerPayload { .. }
            | Self::RetiredUninstallMethod { .. }
            | Self::UnsupportedUninstallMethod { .. } => codes::GENERIC_FAILURE,
        }
    }

    /// A cancellation stops the item but is not treated as a cascading failure
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl UserFacingError for UninstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ReceiptDatabaseUnavailable { .. } => {
                Some("Force a receipt database rebuild with `mia rebuild-receipts --force`.")
            }
            Self::PackageNotInDatabase { .. } => {
                Some("The package may already be gone; check `pkgutil --pkgs`.")
            }
            Self::RetiredUninstallMethod { .. } | Self::UnsupportedUninstallMethod { .. } => {
                Some("Update the item's uninstall_method in the catalog.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReceiptDatabaseUnavailable { .. } | Self::Cancelled
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoPackagesDeclared => "uninstall.no_packages",
            Self::ReceiptDatabaseUnavailable { .. } => "uninstall.receipts_unavailable",
            Self::PackageNotInDatabase { .. } => "uninstall.package_not_found",
            Self::MissingUninstallerPayload { .. } => "uninstall.missing_payload",
            Self::MissingRemovalSpec { .. } => "uninstall.missing_spec",
            Self::RemovalFailed { .. } => "uninstall.removal_failed",
            Self::RetiredUninstallMethod { .. } => "uninstall.retired_method",
            Self::UnsupportedUninstallMethod { .. } => "uninstall.unsupported_method",
            Self::BackendExitNonZero { .. } => "uninstall.backend_failed",
            Self::PreScriptFailed { .. } => "uninstall.prescript_failed",
            Self::Cancelled => "uninstall.cancelled",
        };
        Some(code)
    }
}
