//! Idle-sleep prevention for the duration of a session

use async_trait::async_trait;
use mia_errors::PlatformError;

/// Holds a sleep assertion until dropped
pub struct SleepAssertion {
    _child: Option<tokio::process::Child>,
}

impl SleepAssertion {
    /// An assertion backed by a child process killed on drop
    #[must_use]
    pub fn from_child(child: tokio::process::Child) -> Self {
        Self {
            _child: Some(child),
        }
    }

    /// An assertion that holds nothing
    #[must_use]
    pub fn none() -> Self {
        Self { _child: None }
    }
}

#[async_trait]
pub trait SleepPreventer: Send + Sync {
    async fn prevent_sleep(&self, reason: &str) -> Result<SleepAssertion, PlatformError>;
}
