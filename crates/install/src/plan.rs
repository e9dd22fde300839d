//! Loading and saving the plan document

use mia_errors::{Error, PlanError};
use mia_types::{InstallInfo, OperationResult};
use serde_json::Value;
use std::path::Path;

/// Read the plan; `None` when no plan has been written
///
/// # Errors
///
/// Returns `PlanError::Unreadable` when the file exists but cannot be read or
/// parsed.
pub async fn load_plan(path: &Path) -> Result<Option<InstallInfo>, Error> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PlanError::Unreadable {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into())
        }
    };

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        PlanError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Write the plan through a sibling temp file and rename it into place
///
/// # Errors
///
/// Returns `PlanError::Unwritable` when the document cannot be written.
pub async fn save_plan(path: &Path, info: &InstallInfo) -> Result<(), Error> {
    let unwritable = |message: String| -> Error {
        PlanError::Unwritable {
            path: path.display().to_string(),
            message,
        }
        .into()
    };

    let json = serde_json::to_vec_pretty(info).map_err(|e| unwritable(e.to_string()))?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");

    tokio::fs::write(&staging, json)
        .await
        .map_err(|e| unwritable(e.to_string()))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| unwritable(e.to_string()))
}

/// The single `optional_installs` row matching `predicate`, if exactly one does
fn single_match<'a>(
    rows: &'a mut [Value],
    predicate: impl Fn(&Value) -> bool,
) -> Option<&'a mut serde_json::Map<String, Value>> {
    let mut matches = rows.iter_mut().filter(|row| predicate(row));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    first.as_object_mut()
}

fn set_flags(row: &mut serde_json::Map<String, Value>, flags: &[(&str, bool)]) {
    for (key, value) in flags {
        row.insert((*key).to_string(), Value::Bool(*value));
    }
}

/// Reflect this session's results in the `optional_installs` rows
///
/// Removals match by name; installs match by name and `version_to_install`.
/// Rows matched more than once are left alone.
pub fn update_optional_installs(
    info: &mut InstallInfo,
    install_results: &[OperationResult],
    removal_results: &[OperationResult],
) {
    for removal in removal_results {
        let Some(row) = single_match(&mut info.optional_installs, |row| {
            row.get("name").and_then(Value::as_str) == Some(removal.name.as_str())
        }) else {
            continue;
        };
        if removal.succeeded() {
            set_flags(row, &[("installed", false), ("will_be_removed", false)]);
        } else {
            set_flags(row, &[("removal_error", true), ("will_be_removed", false)]);
        }
    }

    for install in install_results {
        let Some(row) = single_match(&mut info.optional_installs, |row| {
            row.get("name").and_then(Value::as_str) == Some(install.name.as_str())
                && row.get("version_to_install").and_then(Value::as_str)
                    == Some(install.version.as_str())
        }) else {
            continue;
        };
        if !install.succeeded() {
            set_flags(row, &[("install_error", true), ("will_be_installed", false)]);
            continue;
        }
        // On-demand items run each time they are requested and never stay installed
        let on_demand = row.get("OnDemand").and_then(Value::as_bool).unwrap_or(false);
        set_flags(
            row,
            &[
                ("installed", !on_demand),
                ("needs_update", false),
                ("will_be_installed", false),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn result(name: &str, version: &str, status: i32) -> OperationResult {
        OperationResult {
            name: name.to_string(),
            display_name: name.to_string(),
            version: version.to_string(),
            status,
            time: Utc::now(),
            duration_seconds: 0,
            unattended: false,
        }
    }

    #[test]
    fn optional_installs_reflect_results() {
        let mut info: InstallInfo = serde_json::from_value(json!({
            "optional_installs": [
                {"name": "Firefox", "version_to_install": "120.0", "will_be_installed": true},
                {"name": "Chrome", "version_to_install": "119.0", "will_be_installed": true},
                {"name": "Slack", "installed": true, "will_be_removed": true},
                {"name": "Zoom", "version_to_install": "5.0", "OnDemand": true},
            ]
        }))
        .unwrap();

        update_optional_installs(
            &mut info,
            &[
                result("Firefox", "120.0", 0),
                result("Chrome", "119.0", 1),
                result("Zoom", "5.0", 0),
            ],
            &[result("Slack", "", 0)],
        );

        let rows = &info.optional_installs;
        assert_eq!(rows[0]["installed"], json!(true));
        assert_eq!(rows[0]["will_be_installed"], json!(false));
        assert_eq!(rows[1]["install_error"], json!(true));
        assert_eq!(rows[2]["installed"], json!(false));
        assert_eq!(rows[2]["will_be_removed"], json!(false));
        assert_eq!(rows[3]["installed"], json!(false));
        assert_eq!(rows[3]["needs_update"], json!(false));
    }

    #[test]
    fn version_mismatch_leaves_row_alone() {
        let mut info: InstallInfo = serde_json::from_value(json!({
            "optional_installs": [{"name": "Firefox", "version_to_install": "121.0"}]
        }))
        .unwrap();
        update_optional_installs(&mut info, &[result("Firefox", "120.0", 0)], &[]);
        assert!(info.optional_installs[0].get("installed").is_none());
    }

    #[tokio::test]
    async fn missing_plan_is_none_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("InstallInfo.json");
        assert!(load_plan(&path).await.unwrap().is_none());

        let info: InstallInfo = serde_json::from_value(json!({
            "managed_installs": [{"name": "Foo", "installer_type": "nopkg"}],
            "removals": [],
        }))
        .unwrap();
        save_plan(&path, &info).await.unwrap();
        assert_eq!(load_plan(&path).await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn corrupt_plan_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("InstallInfo.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            load_plan(&path).await,
            Err(Error::Plan(PlanError::Unreadable { .. }))
        ));
    }
}
