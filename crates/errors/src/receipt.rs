//! Receipt database error types

use std::borrow::Cow;

use thiserror::Error;

use crate::UserFacingError;

#[derive(Debug, Clone, Error)]
pub enum ReceiptError {
    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("schema setup failed: {message}")]
    SchemaFailed { message: String },

    #[error("receipt database rebuild failed: {message}")]
    RebuildFailed { message: String },

    #[error("receipt database rebuild cancelled")]
    RebuildCancelled,

    #[error("package registry query failed for {package}: {message}")]
    RegistryQueryFailed { package: String, message: String },
}

impl UserFacingError for ReceiptError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DatabaseError { .. } | Self::SchemaFailed { .. } => {
                Some("Delete the receipt database file; it is rebuilt on the next removal.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::RebuildCancelled | Self::RegistryQueryFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DatabaseError { .. } => "receipts.database",
            Self::SchemaFailed { .. } => "receipts.schema",
            Self::RebuildFailed { .. } => "receipts.rebuild_failed",
            Self::RebuildCancelled => "receipts.rebuild_cancelled",
            Self::RegistryQueryFailed { .. } => "receipts.registry_query",
        };
        Some(code)
    }
}
