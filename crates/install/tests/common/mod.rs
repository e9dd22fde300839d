//! Fake platform backends and a session harness rooted in a temp directory

#![allow(dead_code)]

use async_trait::async_trait;
use mia_config::{Config, PathConfig, SessionConfig};
use mia_errors::PlatformError;
use mia_events::{AppEvent, EventMessage, EventReceiver};
use mia_install::{InstallConfig, ManagedInstaller, SessionContext, SessionOutcome};
use mia_platform::{
    DiskImageMounter, FileOwnership, OsInstallerStager, PackageFile, PackageInfo,
    PackageInstaller, PackageOutcome, Platform, ProcessInspector, PackageRegistry, ScriptRunner,
    SelfServeManifest, SelfServeSection, SleepAssertion, SleepPreventer,
};
use mia_types::{EmbeddedScript, ScriptKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scripts exit 0 unless an item/slot has a configured code
#[derive(Default)]
pub struct FakeScripts {
    codes: Mutex<HashMap<(String, ScriptKind), i32>>,
    pub runs: Mutex<Vec<(String, ScriptKind)>>,
}

impl FakeScripts {
    pub fn set_code(&self, item: &str, kind: ScriptKind, code: i32) {
        self.codes
            .lock()
            .unwrap()
            .insert((item.to_string(), kind), code);
    }
}

#[async_trait]
impl ScriptRunner for FakeScripts {
    async fn run_embedded(
        &self,
        item_name: &str,
        script: &EmbeddedScript,
    ) -> Result<i32, PlatformError> {
        let key = (item_name.to_string(), script.kind);
        self.runs.lock().unwrap().push(key.clone());
        Ok(self.codes.lock().unwrap().get(&key).copied().unwrap_or(0))
    }

    async fn run_executable(&self, item_name: &str, _path: &Path) -> Result<i32, PlatformError> {
        self.runs
            .lock()
            .unwrap()
            .push((item_name.to_string(), ScriptKind::Uninstall));
        Ok(0)
    }
}

/// Records every package handed to the native installer
#[derive(Default)]
pub struct FakePackages {
    /// Exit codes by package file name
    codes: Mutex<BTreeMap<String, i32>>,
    restart: Mutex<Vec<String>>,
    pub installed: Mutex<Vec<PathBuf>>,
}

impl FakePackages {
    pub fn fail(&self, package: &str, code: i32) {
        self.codes.lock().unwrap().insert(package.to_string(), code);
    }

    pub fn restart_after(&self, package: &str) {
        self.restart.lock().unwrap().push(package.to_string());
    }

    pub fn installed_names(&self) -> Vec<String> {
        self.installed
            .lock()
            .unwrap()
            .iter()
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl PackageInstaller for FakePackages {
    async fn install(
        &self,
        package: &Path,
        _display_name: &str,
        _suppress_bundle_relocation: bool,
    ) -> Result<PackageOutcome, PlatformError> {
        self.installed.lock().unwrap().push(package.to_path_buf());
        let name = package
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let exit_code = self.codes.lock().unwrap().get(&name).copied().unwrap_or(0);
        Ok(PackageOutcome {
            exit_code,
            restart_needed: exit_code == 0 && self.restart.lock().unwrap().contains(&name),
            log: if exit_code == 0 {
                Vec::new()
            } else {
                vec![format!("installer: {name} failed")]
            },
        })
    }
}

/// Test disk images are directories; mounting one yields the directory itself
#[derive(Default)]
pub struct FakeImages {
    pub mounted: Mutex<Vec<(PathBuf, bool)>>,
    pub unmounted: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl DiskImageMounter for FakeImages {
    async fn mount(&self, image: &Path, shadow: bool) -> Result<Vec<PathBuf>, PlatformError> {
        self.mounted
            .lock()
            .unwrap()
            .push((image.to_path_buf(), shadow));
        Ok(vec![image.to_path_buf()])
    }

    async fn unmount(&self, mountpoint: &Path) -> Result<(), PlatformError> {
        self.unmounted.lock().unwrap().push(mountpoint.to_path_buf());
        Ok(())
    }
}

/// Copies with std; ownership and mode changes are recorded only
#[derive(Default)]
pub struct FakeFiles {
    pub ownership: Mutex<Vec<(PathBuf, String)>>,
}

fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::fs::create_dir_all(destination)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &destination.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        std::fs::copy(source, destination).map(|_| ())
    }
}

#[async_trait]
impl FileOwnership for FakeFiles {
    async fn copy_item(&self, source: &Path, destination: &Path) -> Result<(), PlatformError> {
        copy_tree(source, destination).map_err(|e| PlatformError::ProcessExecutionFailed {
            command: "ditto".to_string(),
            message: e.to_string(),
        })
    }

    async fn strip_quarantine(&self, _path: &Path) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn set_owner(&self, path: &Path, user: &str) -> Result<(), PlatformError> {
        self.ownership
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format!("user:{user}")));
        Ok(())
    }

    async fn set_group(&self, path: &Path, group: &str) -> Result<(), PlatformError> {
        self.ownership
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format!("group:{group}")));
        Ok(())
    }

    async fn set_mode(&self, path: &Path, mode: &str) -> Result<(), PlatformError> {
        self.ownership
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format!("mode:{mode}")));
        Ok(())
    }
}

/// Registry of packages with their install location and file list
#[derive(Default)]
pub struct FakeRegistry {
    packages: BTreeMap<String, (String, Vec<&'static str>)>,
    pub forgotten: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn with(mut self, id: &str, location: &str, files: Vec<&'static str>) -> Self {
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

#[derive(Default)]
pub struct FakeOsInstaller {
    pub staged: Mutex<Vec<(String, Vec<PathBuf>)>>,
}

#[async_trait]
impl OsInstallerStager for FakeOsInstaller {
    async fn record_staged(
        &self,
        item_name: &str,
        _version: &str,
        staged_paths: &[PathBuf],
    ) -> Result<(), PlatformError> {
        self.staged
            .lock()
            .unwrap()
            .push((item_name.to_string(), staged_paths.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProcesses {
    pub running: Mutex<Vec<String>>,
}

#[async_trait]
impl ProcessInspector for FakeProcesses {
    async fn running_processes(&self) -> Result<Vec<String>, PlatformError> {
        Ok(self.running.lock().unwrap().clone())
    }
}

pub struct FakePower;

#[async_trait]
impl SleepPreventer for FakePower {
    async fn prevent_sleep(&self, _reason: &str) -> Result<SleepAssertion, PlatformError> {
        Ok(SleepAssertion::none())
    }
}

#[derive(Default)]
pub struct FakeSelfServe {
    pub removed: Mutex<Vec<(String, SelfServeSection)>>,
}

#[async_trait]
impl SelfServeManifest for FakeSelfServe {
    async fn remove_from_section(
        &self,
        item: &str,
        section: SelfServeSection,
    ) -> Result<(), PlatformError> {
        self.removed
            .lock()
            .unwrap()
            .push((item.to_string(), section));
        Ok(())
    }
}

/// A managed install tree in a temp directory plus the fakes behind it
pub struct Harness {
    pub dir: TempDir,
    pub scripts: Arc<FakeScripts>,
    pub packages: Arc<FakePackages>,
    pub images: Arc<FakeImages>,
    pub files: Arc<FakeFiles>,
    pub registry: Arc<FakeRegistry>,
    pub os_installer: Arc<FakeOsInstaller>,
    pub processes: Arc<FakeProcesses>,
    pub self_serve: Arc<FakeSelfServe>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(FakeRegistry::default())
    }

    pub fn with_registry(registry: FakeRegistry) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Cache")).unwrap();
        std::fs::create_dir_all(dir.path().join("root")).unwrap();
        Self {
            dir,
            scripts: Arc::default(),
            packages: Arc::default(),
            images: Arc::default(),
            files: Arc::default(),
            registry: Arc::new(registry),
            os_installer: Arc::default(),
            processes: Arc::default(),
            self_serve: Arc::default(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            scripts: self.scripts.clone(),
            packages: self.packages.clone(),
            images: self.images.clone(),
            files: self.files.clone(),
            registry: self.registry.clone(),
            os_installer: self.os_installer.clone(),
            processes: self.processes.clone(),
            power: Arc::new(FakePower),
            self_serve: self.self_serve.clone(),
        }
    }

    pub fn config(&self) -> InstallConfig {
        let base = self.dir.path();
        let config = Config {
            paths: PathConfig {
                managed_install_dir: Some(base.to_path_buf()),
                install_history: Some(base.join("InstallHistory.plist")),
                receipts_dir: Some(base.join("receipts")),
                ..PathConfig::default()
            },
            session: SessionConfig {
                suppress_pkgutil_forget: false,
                force_delete_bundles: true,
                import_concurrency: 2,
            },
        };
        InstallConfig::from_config(&config).with_filesystem_root(base.join("root"))
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("Cache")
    }

    /// Cache a flat package
    pub fn cache_package(&self, name: &str) {
        std::fs::write(self.cache().join(name), b"xar!").unwrap();
    }

    /// Cache a disk image holding `files` (relative paths)
    pub fn cache_image(&self, name: &str, files: &[&str]) {
        let image = self.cache().join(name);
        std::fs::create_dir_all(&image).unwrap();
        for file in files {
            let path = image.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"payload").unwrap();
        }
    }

    /// Create a file under the filesystem root
    pub fn touch(&self, relative: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    pub fn write_plan(&self, plan: &Value) {
        std::fs::write(
            self.config().install_info_path,
            serde_json::to_vec_pretty(plan).unwrap(),
        )
        .unwrap();
    }

    pub fn read_plan(&self) -> Value {
        serde_json::from_slice(&std::fs::read(self.config().install_info_path).unwrap()).unwrap()
    }

    pub fn read_report(&self) -> Value {
        serde_json::from_slice(&std::fs::read(self.config().report_path).unwrap()).unwrap()
    }

    pub fn install_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("Logs/Install.log")).unwrap_or_default()
    }

    pub fn main_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("Logs/ManagedSoftwareUpdate.log"))
            .unwrap_or_default()
    }

    pub fn installer(&self) -> ManagedInstaller {
        ManagedInstaller::new(self.platform(), self.config())
    }

    pub async fn run(&self, ctx: SessionContext) -> SessionOutcome {
        self.installer().run(ctx).await.unwrap()
    }

    /// Run with an event channel attached and return every event emitted
    pub async fn run_collecting(&self, ctx: SessionContext) -> (SessionOutcome, Vec<AppEvent>) {
        let (tx, rx) = mia_events::channel();
        let outcome = self.run(ctx.with_event_sender(tx)).await;
        (outcome, drain(rx))
    }
}

/// Names of the plan rows in `list`
pub fn names(plan: &Value, list: &str) -> Vec<String> {
    plan[list]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn drain(mut rx: EventReceiver) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(EventMessage { event, .. }) = rx.try_recv() {
        events.push(event);
    }
    events
}
