//! Recording a staged OS installer for a later dedicated session

use async_trait::async_trait;
use chrono::Utc;
use mia_errors::PlatformError;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Records where a `stage_os_installer` item placed its installer
#[async_trait]
pub trait OsInstallerStager: Send + Sync {
    async fn record_staged(
        &self,
        item_name: &str,
        version: &str,
        staged_paths: &[PathBuf],
    ) -> Result<(), PlatformError>;
}

/// Writes the staged installer record as a JSON file
pub struct JsonOsInstallerStager {
    info_path: PathBuf,
}

impl JsonOsInstallerStager {
    pub fn new(info_path: impl Into<PathBuf>) -> Self {
        Self {
            info_path: info_path.into(),
        }
    }

    #[must_use]
    pub fn info_path(&self) -> &Path {
        &self.info_path
    }
}

#[async_trait]
impl OsInstallerStager for JsonOsInstallerStager {
    async fn record_staged(
        &self,
        item_name: &str,
        version: &str,
        staged_paths: &[PathBuf],
    ) -> Result<(), PlatformError> {
        let record = json!({
            "name": item_name,
            "version": version,
            "staged_paths": staged_paths,
            "staged_at": Utc::now(),
        });
        let body = serde_json::to_vec_pretty(&record).map_err(|e| {
            PlatformError::FilesystemOperationFailed {
                operation: "encode staged installer record".to_string(),
                message: e.to_string(),
            }
        })?;

        if let Some(parent) = self.info_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PlatformError::FilesystemOperationFailed {
                    operation: format!("create {}", parent.display()),
                    message: e.to_string(),
                }
            })?;
        }
        tokio::fs::write(&self.info_path, body)
            .await
            .map_err(|e| PlatformError::FilesystemOperationFailed {
                operation: format!("write {}", self.info_path.display()),
                message: e.to_string(),
            })
    }
}
