//! The user's self-service choices manifest

use async_trait::async_trait;
use mia_errors::PlatformError;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Sections of the self-service manifest the session edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfServeSection {
    ManagedInstalls,
    ManagedUninstalls,
}

impl SelfServeSection {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::ManagedInstalls => "managed_installs",
            Self::ManagedUninstalls => "managed_uninstalls",
        }
    }
}

#[async_trait]
pub trait SelfServeManifest: Send + Sync {
    /// Remove `item` from `section`; a missing manifest is not an error
    async fn remove_from_section(
        &self,
        item: &str,
        section: SelfServeSection,
    ) -> Result<(), PlatformError>;
}

/// Self-service manifest stored as a JSON object of string arrays
pub struct JsonSelfServeManifest {
    path: PathBuf,
}

impl JsonSelfServeManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fs_error(&self, operation: &str, message: impl ToString) -> PlatformError {
        PlatformError::FilesystemOperationFailed {
            operation: format!("{operation} {}", self.path.display()),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl SelfServeManifest for JsonSelfServeManifest {
    async fn remove_from_section(
        &self,
        item: &str,
        section: SelfServeSection,
    ) -> Result<(), PlatformError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.fs_error("read", e)),
        };
        let mut manifest: Value =
            serde_json::from_slice(&body).map_err(|e| self.fs_error("parse", e))?;

        let Some(entries) = manifest
            .get_mut(section.key())
            .and_then(Value::as_array_mut)
        else {
            return Ok(());
        };
        let before = entries.len();
        entries.retain(|entry| entry.as_str() != Some(item));
        if entries.len() == before {
            return Ok(());
        }

        let body = serde_json::to_vec_pretty(&manifest).map_err(|e| self.fs_error("encode", e))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| self.fs_error("write", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn removes_only_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SelfServeManifest.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({
                "managed_installs": ["Firefox", "Slack"],
                "managed_uninstalls": ["Firefox"],
            }))
            .unwrap(),
        )
        .unwrap();

        let manifest = JsonSelfServeManifest::new(&path);
        manifest
            .remove_from_section("Firefox", SelfServeSection::ManagedInstalls)
            .await
            .unwrap();

        let value: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["managed_installs"], json!(["Slack"]));
        assert_eq!(value["managed_uninstalls"], json!(["Firefox"]));
    }

    #[tokio::test]
    async fn missing_manifest_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = JsonSelfServeManifest::new(dir.path().join("absent.json"));
        manifest
            .remove_from_section("Firefox", SelfServeSection::ManagedUninstalls)
            .await
            .unwrap();
        assert!(!manifest.path().exists());
    }
}
