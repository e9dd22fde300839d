//! Staleness check and wholesale re-import from the OS package registry

use futures::stream::{self, StreamExt};
use mia_errors::{Error, ReceiptError};
use mia_platform::{PackageFile, PackageInfo, PackageRegistry};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;

use crate::{queries, schema};

/// Install location some legacy updaters record instead of the real one
const LEGACY_OFFICE_LOCATION: &str = "tmp/com.microsoft.updater/office_location";

/// One package read from the registry, ready for the writer
#[derive(Debug, Clone)]
pub struct ImportedPackage {
    pub info: PackageInfo,
    pub files: Vec<PackageFile>,
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Whether the database at `db_path` is older than the OS package state
///
/// True when the database is missing, when the install history is missing or
/// newer, or when the receipts directory or any `.bom`/`.plist` in it is newer.
pub async fn is_stale(db_path: &Path, install_history: &Path, receipts_dir: &Path) -> bool {
    let Some(db_modified) = modified(db_path).await else {
        return true;
    };

    match modified(install_history).await {
        Some(history) if history > db_modified => return true,
        None => return true,
        Some(_) => {}
    }

    if let Some(dir_modified) = modified(receipts_dir).await {
        if dir_modified > db_modified {
            return true;
        }
        if let Ok(mut entries) = tokio::fs::read_dir(receipts_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let is_receipt = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "bom" || ext == "plist");
                if is_receipt && modified(&path).await.is_some_and(|m| m > db_modified) {
                    return true;
                }
            }
        }
    }

    false
}

/// Root a package's file list at its install location
///
/// `.` is skipped and leading `./` stripped; the stored paths carry no
/// leading slash.
#[must_use]
pub fn installed_paths(location: &str, files: Vec<PackageFile>) -> Vec<PackageFile> {
    let location = if location == LEGACY_OFFICE_LOCATION {
        "Applications"
    } else {
        location
    };

    files
        .into_iter()
        .filter(|file| file.path != "." && !file.path.is_empty())
        .map(|mut file| {
            let relative = file.path.trim_start_matches("./").trim_start_matches('/');
            file.path = if location.is_empty() {
                relative.to_string()
            } else {
                format!("{location}/{relative}")
            };
            file
        })
        .collect()
}

/// Read one package's metadata and files; registry failures fall back to
/// defaults so the package still owns whatever could be read
async fn import_package(registry: &dyn PackageRegistry, package_id: String) -> ImportedPackage {
    let info = registry
        .package_info(&package_id)
        .await
        .unwrap_or_else(|_| mia_platform::registry::parse_package_info(&package_id, ""));
    let files = registry
        .package_files(&package_id)
        .await
        .unwrap_or_default();
    let files = installed_paths(&info.location, files);
    ImportedPackage { info, files }
}

/// Single writer: owns the only transaction and applies every import
pub(crate) async fn write_receipts(
    pool: Pool<Sqlite>,
    mut rx: mpsc::Receiver<ImportedPackage>,
) -> Result<usize, Error> {
    let mut tx = pool.begin().await?;
    schema::reset(&mut tx).await?;

    let mut count = 0;
    while let Some(package) = rx.recv().await {
        let pkg_key = queries::insert_package(&mut tx, &package.info).await?;
        for file in &package.files {
            let path_key = queries::path_key(&mut tx, &file.path).await?;
            queries::insert_package_path(&mut tx, pkg_key, path_key, file).await?;
        }
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

/// Stream of imported packages, read concurrently from the registry
pub(crate) fn import_stream(
    registry: Arc<dyn PackageRegistry>,
    package_ids: Vec<String>,
    concurrency: usize,
) -> impl futures::Stream<Item = ImportedPackage> {
    stream::iter(package_ids)
        .map(move |package_id| {
            let registry = Arc::clone(&registry);
            async move { import_package(registry.as_ref(), package_id).await }
        })
        .buffer_unordered(concurrency.max(1))
}

/// Remove a database file and its journal siblings
pub(crate) async fn remove_database_files(db_path: &Path) -> Result<(), Error> {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        match tokio::fs::remove_file(&name).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ReceiptError::RebuildFailed {
                    message: format!("could not remove {}: {e}", db_path.display()),
                }
                .into())
            }
        }
    }
    Ok(())
}
