//! Plain-text operations logs under the log directory

use chrono::Local;
use mia_errors::Error;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const INSTALL_LOG: &str = "Install.log";
pub const MAIN_LOG: &str = "ManagedSoftwareUpdate.log";

/// Appends timestamped lines to `Install.log` and the main session log
#[derive(Debug, Clone)]
pub struct OperationsLog {
    dir: PathBuf,
}

impl OperationsLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn install_log_path(&self) -> PathBuf {
        self.dir.join(INSTALL_LOG)
    }

    #[must_use]
    pub fn main_log_path(&self) -> PathBuf {
        self.dir.join(MAIN_LOG)
    }

    /// Append a per-item result line to `Install.log`
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory or file cannot be written.
    pub async fn record(&self, line: &str) -> Result<(), Error> {
        append(&self.install_log_path(), line).await
    }

    /// Append a line to the main session log
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory or file cannot be written.
    pub async fn session(&self, line: &str) -> Result<(), Error> {
        append(&self.main_log_path(), line).await
    }
}

async fn append(path: &Path, line: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;

    let stamp = Local::now().format("%b %d %Y %H:%M:%S %z");
    file.write_all(format!("{stamp} {line}\n").as_bytes())
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    file.flush().await.map_err(|e| Error::io_with_path(&e, path))
}
