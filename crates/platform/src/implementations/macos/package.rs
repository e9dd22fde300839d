//! `installer(8)` and `pkgutil(1)` backed implementations

use async_trait::async_trait;
use mia_errors::PlatformError;
use mia_types::RestartAction;
use std::path::Path;

use crate::package::{PackageInstaller, PackageOutcome};
use crate::process::{execute, execute_checked, PlatformCommand};
use crate::registry::{parse_file_line, parse_package_info, PackageFile, PackageInfo, PackageRegistry};

const INSTALLER: &str = "/usr/sbin/installer";
const PKGUTIL: &str = "/usr/sbin/pkgutil";
const PLIST_BUDDY: &str = "/usr/libexec/PlistBuddy";

/// Installs packages with the system installer
pub struct MacOSPackageInstaller;

impl MacOSPackageInstaller {
    pub fn new() -> Self {
        Self
    }

    async fn restart_action(&self, package: &Path) -> RestartAction {
        let mut cmd = PlatformCommand::new(INSTALLER);
        cmd.args(["-query", "RestartAction", "-pkg"])
            .arg(package.to_string_lossy());
        match execute(&cmd).await {
            Ok(output) => RestartAction::parse(output.stdout_text().trim()),
            Err(_) => RestartAction::None,
        }
    }

    /// Stop a bundle package from relocating its payload onto existing copies
    async fn suppress_relocation(&self, package: &Path) {
        let contents = package.join("Contents");
        let _ = tokio::fs::remove_file(contents.join("Resources/TokenDefinitions.plist")).await;

        let info = contents.join("Info.plist");
        if tokio::fs::metadata(&info).await.is_ok() {
            let mut cmd = PlatformCommand::new(PLIST_BUDDY);
            cmd.args(["-c", "Delete :IFPkgPathMappings"])
                .arg(info.to_string_lossy());
            let _ = execute(&cmd).await;
        }
    }
}

impl Default for MacOSPackageInstaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageInstaller for MacOSPackageInstaller {
    async fn install(
        &self,
        package: &Path,
        display_name: &str,
        suppress_bundle_relocation: bool,
    ) -> Result<PackageOutcome, PlatformError> {
        let package = tokio::fs::canonicalize(package)
            .await
            .unwrap_or_else(|_| package.to_path_buf());

        let is_bundle = tokio::fs::metadata(&package)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if suppress_bundle_relocation && is_bundle {
            self.suppress_relocation(&package).await;
        }

        let restart = self.restart_action(&package).await.requires_restart();

        tracing::info!(item = display_name, package = %package.display(), "running installer");
        let mut cmd = PlatformCommand::new(INSTALLER);
        cmd.args(["-verboseR", "-pkg"])
            .arg(package.to_string_lossy())
            .args(["-target", "/"])
            .env("USER", "root")
            .env("HOME", "/var/root");
        let output = execute(&cmd).await?;

        let exit_code = output.exit_code();
        let mut log: Vec<String> = output.stdout_text().lines().map(str::to_string).collect();
        log.extend(output.stderr_text().lines().map(str::to_string));

        Ok(PackageOutcome {
            exit_code,
            restart_needed: restart && exit_code == 0,
            log,
        })
    }
}

/// Reads and edits the OS receipt registry with `pkgutil`
pub struct PkgutilRegistry;

impl PkgutilRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PkgutilRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn pkgutil(args: &[&str]) -> Result<String, PlatformError> {
    let mut cmd = PlatformCommand::new(PKGUTIL);
    cmd.args(args);
    Ok(execute_checked(&cmd).await?.stdout_text())
}

#[async_trait]
impl PackageRegistry for PkgutilRegistry {
    async fn list_packages(&self) -> Result<Vec<String>, PlatformError> {
        let text = pkgutil(&["--pkgs"]).await?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn package_info(&self, package_id: &str) -> Result<PackageInfo, PlatformError> {
        let text = pkgutil(&["--pkg-info", package_id]).await?;
        Ok(parse_package_info(package_id, &text))
    }

    async fn package_files(&self, package_id: &str) -> Result<Vec<PackageFile>, PlatformError> {
        let text = pkgutil(&["--files", package_id]).await?;
        Ok(text.lines().filter_map(parse_file_line).collect())
    }

    async fn forget(&self, package_id: &str) -> Result<(), PlatformError> {
        pkgutil(&["--forget", package_id]).await.map(|_| ())
    }
}
