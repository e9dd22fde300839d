//! macOS-specific platform implementation

pub mod filesystem;
pub mod package;
pub mod process;

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::Platform;
use crate::osinstaller::JsonOsInstallerStager;
use crate::selfserve::JsonSelfServeManifest;

/// macOS platform implementation
pub struct MacOSPlatform;

impl MacOSPlatform {
    /// Wire every collaborator to its command-line backend
    #[allow(clippy::new_ret_no_self)]
    pub fn new(staged_info_path: PathBuf, self_serve_path: PathBuf) -> Platform {
        Platform {
            scripts: Arc::new(process::MacOSScriptRunner::new()),
            packages: Arc::new(package::MacOSPackageInstaller::new()),
            images: Arc::new(filesystem::HdiutilMounter::new()),
            files: Arc::new(filesystem::MacOSFileOwnership::new()),
            registry: Arc::new(package::PkgutilRegistry::new()),
            os_installer: Arc::new(JsonOsInstallerStager::new(staged_info_path)),
            processes: Arc::new(process::MacOSProcessInspector::new()),
            power: Arc::new(process::MacOSSleepPreventer::new()),
            self_serve: Arc::new(JsonSelfServeManifest::new(self_serve_path)),
        }
    }
}
