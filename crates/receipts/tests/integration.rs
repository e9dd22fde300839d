//! Integration tests for the receipt database

use async_trait::async_trait;
use mia_errors::{Error, PlatformError, ReceiptError, UninstallError};
use mia_platform::{PackageFile, PackageInfo, PackageRegistry};
use mia_receipts::{ReceiptDb, ReceiptDbOptions};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeRegistry {
    packages: BTreeMap<String, (String, Vec<&'static str>)>,
    forgotten: Mutex<Vec<String>>,
}

impl FakeRegistry {
    fn with(mut self, id: &str, location: &str, files: Vec<&'static str>) -> Self {
        self.packages
            .insert(id.to_string(), (location.to_string(), files));
        self
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn list_packages(&self) -> Result<Vec<String>, PlatformError> {
        Ok(self.packages.keys().cloned().collect())
    }

    async fn package_info(&self, package_id: &str) -> Result<PackageInfo, PlatformError> {
        let (location, _) = self.packages.get(package_id).ok_or_else(|| {
            PlatformError::UnexpectedOutput {
                command: "pkgutil".into(),
                message: format!("no receipt for {package_id}"),
            }
        })?;
        Ok(PackageInfo {
            package_id: package_id.to_string(),
            version: "1.0".to_string(),
            install_time: 1_700_000_000,
            location: location.clone(),
        })
    }

    async fn package_files(&self, package_id: &str) -> Result<Vec<PackageFile>, PlatformError> {
        let (_, files) = &self.packages[package_id];
        Ok(files
            .iter()
            .map(|path| PackageFile {
                path: (*path).to_string(),
                uid: 0,
                gid: 0,
                mode: 0o644,
            })
            .collect())
    }

    async fn forget(&self, package_id: &str) -> Result<(), PlatformError> {
        self.forgotten.lock().unwrap().push(package_id.to_string());
        Ok(())
    }
}

/// Two packages sharing one library
fn shared_library_registry() -> FakeRegistry {
    FakeRegistry::default()
        .with(
            "com.example.foo",
            "",
            vec![".", "./Applications/Foo.app", "./usr/local/lib/libshared.dylib"],
        )
        .with(
            "com.example.bar",
            "usr/local",
            vec!["bin/bar", "lib/libshared.dylib"],
        )
}

fn options(dir: &TempDir) -> ReceiptDbOptions {
    let history = dir.path().join("InstallHistory.plist");
    std::fs::write(&history, b"<plist/>").unwrap();
    let past = SystemTime::now() - Duration::from_secs(3600);
    std::fs::File::options()
        .write(true)
        .open(&history)
        .unwrap()
        .set_modified(past)
        .unwrap();

    ReceiptDbOptions {
        db_path: dir.path().join("b.receiptdb"),
        install_history: history,
        receipts_dir: dir.path().join("receipts"),
        import_concurrency: 4,
    }
}

async fn open(dir: &TempDir, registry: Arc<FakeRegistry>, force: bool) -> ReceiptDb {
    let (tx, _rx) = mia_events::channel();
    ReceiptDb::open(options(dir), registry, tx, force, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn shared_paths_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir, Arc::new(shared_library_registry()), false).await;

    let keys = db
        .package_keys(&["com.example.foo".to_string()])
        .await
        .unwrap();
    let paths = db.paths_owned_only_by(&keys).await.unwrap();
    assert_eq!(paths, vec!["Applications/Foo.app".to_string()]);

    let both = db
        .package_keys(&["com.example.foo".to_string(), "com.example.bar".to_string()])
        .await
        .unwrap();
    let paths = db.paths_owned_only_by(&both).await.unwrap();
    assert_eq!(
        paths,
        vec![
            "Applications/Foo.app".to_string(),
            "usr/local/bin/bar".to_string(),
            "usr/local/lib/libshared.dylib".to_string(),
        ]
    );
}

#[tokio::test]
async fn unknown_package_fails_the_whole_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir, Arc::new(shared_library_registry()), false).await;

    let err = db
        .package_keys(&["com.example.foo".to_string(), "com.example.gone".to_string()])
        .await
        .unwrap_err();
    match err {
        Error::Uninstall(UninstallError::PackageNotInDatabase { package }) => {
            assert_eq!(package, "com.example.gone");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(shared_library_registry());
    let db = open(&dir, Arc::clone(&registry), true).await;
    let packages = db.package_count().await.unwrap();
    let paths = db.path_count().await.unwrap();
    assert_eq!(packages, 2);
    assert_eq!(paths, 3);

    let imported = db
        .rebuild(true, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(imported, 2);
    assert_eq!(db.package_count().await.unwrap(), packages);
    assert_eq!(db.path_count().await.unwrap(), paths);
}

#[tokio::test]
async fn removing_receipts_prunes_orphans_and_forgets() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(shared_library_registry());
    let db = open(&dir, Arc::clone(&registry), false).await;

    let keys = db
        .package_keys(&["com.example.foo".to_string()])
        .await
        .unwrap();
    db.remove_receipts(&keys, false).await.unwrap();

    assert_eq!(db.package_count().await.unwrap(), 1);
    // Only bar's two paths remain
    assert_eq!(db.path_count().await.unwrap(), 2);
    assert_eq!(
        *registry.forgotten.lock().unwrap(),
        vec!["com.example.foo".to_string()]
    );
}

#[tokio::test]
async fn registry_forget_can_be_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(shared_library_registry());
    let db = open(&dir, Arc::clone(&registry), false).await;

    let keys = db
        .package_keys(&["com.example.bar".to_string()])
        .await
        .unwrap();
    db.remove_receipts(&keys, true).await.unwrap();
    assert!(registry.forgotten.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fresh_database_is_not_stale_until_history_changes() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(&dir);
    assert!(ReceiptDb::needs_rebuild(&opts).await);

    let _db = open(&dir, Arc::new(shared_library_registry()), false).await;
    assert!(!ReceiptDb::needs_rebuild(&opts).await);

    let future = SystemTime::now() + Duration::from_secs(3600);
    std::fs::File::options()
        .write(true)
        .open(&opts.install_history)
        .unwrap()
        .set_modified(future)
        .unwrap();
    assert!(ReceiptDb::needs_rebuild(&opts).await);
}

#[tokio::test]
async fn cancelled_rebuild_removes_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, _rx) = mia_events::channel();

    let result = ReceiptDb::open(
        options(&dir),
        Arc::new(shared_library_registry()),
        tx,
        true,
        &cancel,
    )
    .await;

    assert!(matches!(
        result,
        Err(Error::Receipt(ReceiptError::RebuildCancelled))
    ));
    assert!(!dir.path().join("b.receiptdb").exists());
}

#[tokio::test]
async fn identifiers_with_quotes_are_bound_not_spliced() {
    let dir = tempfile::tempdir().unwrap();
    let registry = shared_library_registry().with(
        "com.example.\"quoted') OR 1=1 --",
        "",
        vec!["./Applications/Quoted.app"],
    );
    let db = open(&dir, Arc::new(registry), false).await;

    let keys = db
        .package_keys(&["com.example.\"quoted') OR 1=1 --".to_string()])
        .await
        .unwrap();
    assert_eq!(keys.len(), 1);
    let paths = db.paths_owned_only_by(&keys).await.unwrap();
    assert_eq!(paths, vec!["Applications/Quoted.app".to_string()]);
}

#[tokio::test]
async fn removal_is_written_through_to_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(&dir);
    let db = open(&dir, Arc::new(shared_library_registry()), false).await;

    // The registry just touched a receipt, and the database file looks older
    std::fs::create_dir_all(&opts.receipts_dir).unwrap();
    let receipt = opts.receipts_dir.join("com.example.foo.bom");
    std::fs::write(&receipt, b"bom").unwrap();
    let set_mtime = |path: &std::path::Path, age: u64| {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(age))
            .unwrap();
    };
    set_mtime(&receipt, 60);
    set_mtime(&opts.db_path, 600);
    assert!(ReceiptDb::needs_rebuild(&opts).await);

    let keys = db
        .package_keys(&["com.example.foo".to_string()])
        .await
        .unwrap();
    db.remove_receipts(&keys, false).await.unwrap();

    assert!(!ReceiptDb::needs_rebuild(&opts).await);
}
