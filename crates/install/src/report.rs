//! The session report shared with the other stages of the agent

use mia_errors::Error;
use mia_types::SessionReport;
use serde_json::Value;
use std::path::Path;

pub const ITEMS_TO_INSTALL: &str = "ItemsToInstall";
pub const ITEMS_TO_REMOVE: &str = "ItemsToRemove";

/// Read the existing report; a missing file yields an empty report
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_report(path: &Path) -> Result<SessionReport, Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionReport::default()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}

/// # Errors
///
/// Returns an error if the report cannot be serialized or written.
pub async fn save_report(path: &Path, report: &SessionReport) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| Error::io_with_path(&e, path))
}

/// Record the rows a list is about to process
pub fn record_pending(report: &mut SessionReport, key: &str, rows: Vec<Value>) {
    report.other.insert(key.to_string(), Value::Array(rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn foreign_keys_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ManagedInstallReport.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({"ManifestName": "site_default", "Errors": []})).unwrap(),
        )
        .unwrap();

        let mut report = load_report(&path).await.unwrap();
        record_pending(&mut report, ITEMS_TO_INSTALL, vec![json!({"name": "Foo"})]);
        save_report(&path, &report).await.unwrap();

        let saved: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved["ManifestName"], json!("site_default"));
        assert_eq!(saved["ItemsToInstall"][0]["name"], json!("Foo"));
        assert_eq!(saved["InstallResults"], json!([]));
    }

    #[tokio::test]
    async fn missing_report_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = load_report(&dir.path().join("absent.json")).await.unwrap();
        assert!(report.install_results.is_empty());
        assert!(report.other.is_empty());
    }
}
