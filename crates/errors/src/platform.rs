//! Platform collaborator errors

use thiserror::Error;

/// Errors raised by the command-backed platform collaborators
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("filesystem operation failed: {operation} - {message}")]
    FilesystemOperationFailed { operation: String, message: String },

    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("disk image {image} could not be mounted: {message}")]
    MountFailed { image: String, message: String },

    #[error("unexpected output from {command}: {message}")]
    UnexpectedOutput { command: String, message: String },
}

impl PlatformError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::FilesystemOperationFailed { .. } => "platform.filesystem",
            Self::ProcessExecutionFailed { .. } => "platform.process",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::MountFailed { .. } => "platform.mount",
            Self::UnexpectedOutput { .. } => "platform.unexpected_output",
        })
    }
}
