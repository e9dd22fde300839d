//! `hdiutil` disk images and command-line ownership tools

use async_trait::async_trait;
use mia_errors::PlatformError;
use std::path::{Path, PathBuf};

use crate::diskimage::DiskImageMounter;
use crate::filesystem::{FileOwnership, QUARANTINE_XATTR};
use crate::process::{execute, execute_checked, PlatformCommand};

const HDIUTIL: &str = "/usr/bin/hdiutil";

/// Mounts images under a random `/tmp` mountpoint, hidden from the Finder
pub struct HdiutilMounter;

impl HdiutilMounter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HdiutilMounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract mountpoints from `hdiutil attach` output
///
/// Each line is tab separated; the mountpoint, when present, is the last
/// absolute field that is not a device node.
#[must_use]
pub fn parse_attach_output(text: &str) -> Vec<PathBuf> {
    text.lines()
        .filter_map(|line| {
            line.split('\t')
                .map(str::trim)
                .filter(|field| field.starts_with('/') && !field.starts_with("/dev/"))
                .last()
                .map(PathBuf::from)
        })
        .collect()
}

#[async_trait]
impl DiskImageMounter for HdiutilMounter {
    async fn mount(&self, image: &Path, shadow: bool) -> Result<Vec<PathBuf>, PlatformError> {
        let mut cmd = PlatformCommand::new(HDIUTIL);
        cmd.arg("attach")
            .arg(image.to_string_lossy())
            .args(["-nobrowse", "-mountRandom", "/tmp"]);
        if shadow {
            cmd.arg("-shadow");
        }

        let output = execute(&cmd).await?;
        if !output.status.success() {
            return Err(PlatformError::MountFailed {
                image: image.display().to_string(),
                message: output.stderr_text(),
            });
        }
        Ok(parse_attach_output(&output.stdout_text()))
    }

    async fn unmount(&self, mountpoint: &Path) -> Result<(), PlatformError> {
        let mut cmd = PlatformCommand::new(HDIUTIL);
        cmd.arg("detach").arg(mountpoint.to_string_lossy());
        if execute_checked(&cmd).await.is_ok() {
            return Ok(());
        }

        tracing::warn!(mountpoint = %mountpoint.display(), "detach failed, retrying with -force");
        cmd.arg("-force");
        execute_checked(&cmd).await.map(|_| ())
    }
}

/// Copies with `ditto` and applies ownership with the standard tools
pub struct MacOSFileOwnership;

impl MacOSFileOwnership {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSFileOwnership {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_on_path(program: &str, args: &[&str], path: &Path) -> Result<(), PlatformError> {
    let mut cmd = PlatformCommand::new(program);
    cmd.args(args).arg(path.to_string_lossy());
    execute_checked(&cmd).await.map(|_| ())
}

#[async_trait]
impl FileOwnership for MacOSFileOwnership {
    async fn copy_item(&self, source: &Path, destination: &Path) -> Result<(), PlatformError> {
        let mut cmd = PlatformCommand::new("/usr/bin/ditto");
        cmd.arg("--noqtn")
            .arg(source.to_string_lossy())
            .arg(destination.to_string_lossy());
        execute_checked(&cmd).await.map(|_| ())
    }

    async fn strip_quarantine(&self, path: &Path) -> Result<(), PlatformError> {
        run_on_path("/usr/bin/xattr", &["-d", "-r", QUARANTINE_XATTR], path).await
    }

    async fn set_owner(&self, path: &Path, user: &str) -> Result<(), PlatformError> {
        run_on_path("/usr/sbin/chown", &["-R", user], path).await
    }

    async fn set_group(&self, path: &Path, group: &str) -> Result<(), PlatformError> {
        run_on_path("/usr/bin/chgrp", &["-R", group], path).await
    }

    async fn set_mode(&self, path: &Path, mode: &str) -> Result<(), PlatformError> {
        run_on_path("/bin/chmod", &["-R", mode], path).await
    }
}
