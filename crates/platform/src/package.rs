//! Native package installation

use async_trait::async_trait;
use mia_errors::PlatformError;
use std::path::Path;

/// File extensions the native installer accepts
pub const PACKAGE_EXTENSIONS: &[&str] = &["pkg", "mpkg"];

/// File extensions treated as disk images
pub const DISK_IMAGE_EXTENSIONS: &[&str] = &["dmg", "iso", "dvdr", "cdr", "sparseimage"];

#[must_use]
pub fn is_package(path: &Path) -> bool {
    has_extension(path, PACKAGE_EXTENSIONS)
}

#[must_use]
pub fn is_disk_image(path: &Path) -> bool {
    has_extension(path, DISK_IMAGE_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Result of one run of the native installer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOutcome {
    pub exit_code: i32,
    /// The package declared a restart and installed successfully
    pub restart_needed: bool,
    /// Installer output kept for the error log when the run fails
    pub log: Vec<String>,
}

/// Installs a flat or bundle package onto the boot volume
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(
        &self,
        package: &Path,
        display_name: &str,
        suppress_bundle_relocation: bool,
    ) -> Result<PackageOutcome, PlatformError>;
}
