//! Install plan error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("cannot read install plan {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("cannot write install plan {path}: {message}")]
    Unwritable { path: String, message: String },

    #[error("invalid plan item '{name}': {message}")]
    InvalidItem { name: String, message: String },
}

impl PlanError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::Unreadable { .. } => "plan.unreadable",
            Self::Unwritable { .. } => "plan.unwritable",
            Self::InvalidItem { .. } => "plan.invalid_item",
        })
    }
}
