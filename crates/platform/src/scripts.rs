//! Script execution

use async_trait::async_trait;
use mia_errors::PlatformError;
use mia_types::EmbeddedScript;
use std::path::Path;

/// Runs item scripts and reports their exit code
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run a script body carried inline by a plan item
    async fn run_embedded(
        &self,
        item_name: &str,
        script: &EmbeddedScript,
    ) -> Result<i32, PlatformError>;

    /// Run an executable already present on disk
    async fn run_executable(&self, item_name: &str, path: &Path) -> Result<i32, PlatformError>;
}
