//! Routing an install item to its backend

use mia_errors::{codes, InstallError, PlatformError};
use mia_events::{AppEvent, EventEmitter, FailureContext, InstallEvent};
use mia_platform::package::{is_disk_image, is_package};
use mia_platform::{MountGuard, Platform};
use mia_types::{CopySpec, InstallItem, Installer, ItemMeta};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::copy::copy_items_from_mountpoint;
use crate::{scripts, InstallConfig, SessionContext};

/// Status and restart flag for one dispatched item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemOutcome {
    pub status: i32,
    pub restart_needed: bool,
}

impl ItemOutcome {
    #[must_use]
    pub fn success(restart_needed: bool) -> Self {
        Self {
            status: codes::SUCCESS,
            restart_needed,
        }
    }

    #[must_use]
    pub fn failure(status: i32) -> Self {
        Self {
            status,
            restart_needed: false,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == codes::SUCCESS
    }
}

fn mount_failure(image: &Path, err: PlatformError) -> InstallError {
    match err {
        PlatformError::MountFailed { image, message } => {
            InstallError::MountFailure { image, message }
        }
        other => InstallError::MountFailure {
            image: image.display().to_string(),
            message: other.to_string(),
        },
    }
}

/// Routes install items to the native installer, the disk image copier or
/// the OS installer stager
pub struct InstallDispatcher<'a> {
    platform: &'a Platform,
    config: &'a InstallConfig,
    ctx: &'a SessionContext,
}

impl<'a> InstallDispatcher<'a> {
    #[must_use]
    pub fn new(platform: &'a Platform, config: &'a InstallConfig, ctx: &'a SessionContext) -> Self {
        Self {
            platform,
            config,
            ctx,
        }
    }

    /// Run the pre-install script, the backend and the post-install script
    ///
    /// A non-zero pre-install script stops the item with its exit code. A
    /// non-zero post-install script is only a warning.
    pub async fn install(&self, item: &InstallItem) -> ItemOutcome {
        let meta = &item.meta;
        self.ctx.emit(AppEvent::Install(InstallEvent::Started {
            item: meta.name.clone(),
            version: meta.version().to_string(),
            installer_type: item.installer.type_name().to_string(),
        }));

        let result = match &item.pre_script {
            Some(script) => {
                match scripts::run_embedded(self.platform.scripts.as_ref(), self.ctx, &meta.name, script)
                    .await
                {
                    0 => self.dispatch(item).await,
                    code => Err(InstallError::PreScriptFailed {
                        item: meta.name.clone(),
                        code,
                    }),
                }
            }
            None => self.dispatch(item).await,
        };

        let restart_needed = match result {
            Ok(restart_needed) => restart_needed,
            Err(err) => {
                let status = err.status_code();
                self.ctx.emit(AppEvent::Install(InstallEvent::Failed {
                    item: meta.name.clone(),
                    version: meta.version().to_string(),
                    status,
                    failure: FailureContext::from_error(&err),
                }));
                return ItemOutcome::failure(status);
            }
        };

        if let Some(script) = &item.post_script {
            let code =
                scripts::run_embedded(self.platform.scripts.as_ref(), self.ctx, &meta.name, script)
                    .await;
            if code != 0 {
                self.ctx.emit(AppEvent::Install(InstallEvent::PostScriptFailed {
                    item: meta.name.clone(),
                    code,
                }));
            }
        }

        self.ctx.emit(AppEvent::Install(InstallEvent::Completed {
            item: meta.name.clone(),
            version: meta.version().to_string(),
            restart_needed,
        }));
        ItemOutcome::success(restart_needed)
    }

    /// The cached payload; `None` when the item has none to check
    async fn payload(&self, item: &InstallItem) -> Result<Option<PathBuf>, InstallError> {
        if !item.installer.needs_payload() {
            return Ok(None);
        }
        let Some(path) = item.payload_path(&self.config.cache_dir) else {
            return Ok(None);
        };
        if tokio::fs::symlink_metadata(&path).await.is_err() {
            return Err(InstallError::MissingPayload {
                item: item.installer_item.clone().unwrap_or_default(),
                path: path.display().to_string(),
            });
        }
        Ok(Some(path))
    }

    /// Returns whether the item needs a restart
    async fn dispatch(&self, item: &InstallItem) -> Result<bool, InstallError> {
        let payload = self.payload(item).await?;
        let requires_restart = item.meta.restart_action.requires_restart();
        let missing = || InstallError::MissingPayload {
            item: item.meta.name.clone(),
            path: self.config.cache_dir.display().to_string(),
        };

        match &item.installer {
            Installer::PackageInstall {
                package_path,
                suppress_bundle_relocation,
            } => {
                let payload = payload.ok_or_else(missing)?;
                let restart = self
                    .install_payload(
                        &item.meta,
                        &payload,
                        package_path.as_deref(),
                        *suppress_bundle_relocation,
                    )
                    .await?;
                Ok(restart || requires_restart)
            }
            Installer::CopyFromDmg { items_to_copy } => {
                let payload = payload.ok_or_else(missing)?;
                self.copy_from_image(&payload, items_to_copy).await?;
                Ok(requires_restart)
            }
            Installer::StageOsInstaller { items_to_copy } => {
                let payload = payload.ok_or_else(missing)?;
                let staged = self.copy_from_image(&payload, items_to_copy).await?;
                if let Err(e) = self
                    .platform
                    .os_installer
                    .record_staged(&item.meta.name, item.meta.version(), &staged)
                    .await
                {
                    self.ctx.emit_warning_with_context(
                        format!("could not record staged installer {}", item.meta.name),
                        e.to_string(),
                    );
                }
                Ok(requires_restart)
            }
            Installer::NoPkg => Ok(requires_restart),
            Installer::StartOsInstall => Err(InstallError::UnsupportedInstallerType {
                installer_type: "startosinstall outside a dedicated session".to_string(),
            }),
            Installer::Retired(installer_type) => Err(InstallError::RetiredInstallerType {
                installer_type: installer_type.clone(),
            }),
            Installer::Unknown(installer_type) => Err(InstallError::UnsupportedInstallerType {
                installer_type: installer_type.clone(),
            }),
        }
    }

    /// Install a package payload, directly or from inside a disk image
    ///
    /// Inside an image, `package_path` names the package to install; without
    /// one every package at the image root is installed.
    pub(crate) async fn install_payload(
        &self,
        meta: &ItemMeta,
        payload: &Path,
        package_path: Option<&str>,
        suppress_bundle_relocation: bool,
    ) -> Result<bool, InstallError> {
        if is_disk_image(payload) {
            let guard = self.mount(payload, suppress_bundle_relocation).await?;
            let result = match package_path.filter(|path| is_package(Path::new(path))) {
                Some(path) => {
                    let package = guard.mountpoint().join(path);
                    if tokio::fs::symlink_metadata(&package).await.is_ok() {
                        self.install_package(meta, &package, suppress_bundle_relocation)
                            .await
                    } else {
                        Err(InstallError::NoInstallableItemFound {
                            location: package.display().to_string(),
                        })
                    }
                }
                None => {
                    self.install_all(meta, guard.mountpoint(), suppress_bundle_relocation)
                        .await
                }
            };
            self.unmount(guard).await;
            return result;
        }

        if is_package(payload) {
            return self
                .install_package(meta, payload, suppress_bundle_relocation)
                .await;
        }

        Err(InstallError::NoInstallableItemFound {
            location: payload.display().to_string(),
        })
    }

    /// Install every package under `dir`, descending into nested disk images
    ///
    /// Stops at the first failure.
    async fn install_all(
        &self,
        meta: &ItemMeta,
        dir: &Path,
        suppress_bundle_relocation: bool,
    ) -> Result<bool, InstallError> {
        let mut entries = Vec::new();
        let mut listing = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| InstallError::NoInstallableItemFound {
                location: format!("{}: {e}", dir.display()),
            })?;
        while let Ok(Some(entry)) = listing.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with('.') {
                entries.push(entry.path());
            }
        }
        entries.sort();

        let mut restart = false;
        let mut installed_any = false;
        for path in entries {
            if self.ctx.stop_requested() {
                return Err(InstallError::Cancelled);
            }
            if is_disk_image(&path) {
                let guard = self.mount(&path, true).await?;
                let nested =
                    Box::pin(self.install_all(meta, guard.mountpoint(), suppress_bundle_relocation))
                        .await;
                self.unmount(guard).await;
                restart |= nested?;
                installed_any = true;
            } else if is_package(&path) {
                restart |= self
                    .install_package(meta, &path, suppress_bundle_relocation)
                    .await?;
                installed_any = true;
            }
        }

        if installed_any {
            Ok(restart)
        } else {
            Err(InstallError::NoInstallableItemFound {
                location: dir.display().to_string(),
            })
        }
    }

    async fn install_package(
        &self,
        meta: &ItemMeta,
        package: &Path,
        suppress_bundle_relocation: bool,
    ) -> Result<bool, InstallError> {
        let outcome = self
            .platform
            .packages
            .install(package, meta.display(), suppress_bundle_relocation)
            .await
            .map_err(|e| {
                self.ctx.emit_error_with_details(
                    format!("could not run the installer for {}", package.display()),
                    e.to_string(),
                );
                InstallError::BackendExitNonZero {
                    backend: "installer".to_string(),
                    code: codes::GENERIC_FAILURE,
                }
            })?;

        if outcome.exit_code != 0 {
            if !outcome.log.is_empty() {
                self.ctx.emit_error_with_details(
                    format!("install of {} failed", package.display()),
                    outcome.log.join("\n"),
                );
            }
            return Err(InstallError::BackendExitNonZero {
                backend: "installer".to_string(),
                code: outcome.exit_code,
            });
        }
        Ok(outcome.restart_needed)
    }

    async fn copy_from_image(
        &self,
        image: &Path,
        specs: &[CopySpec],
    ) -> Result<Vec<PathBuf>, InstallError> {
        let guard = self.mount(image, false).await?;
        let result =
            copy_items_from_mountpoint(self.platform.files.as_ref(), guard.mountpoint(), specs, self.ctx)
                .await;
        self.unmount(guard).await;
        result
    }

    async fn mount(&self, image: &Path, shadow: bool) -> Result<MountGuard, InstallError> {
        let guard = MountGuard::attach(Arc::clone(&self.platform.images), image, shadow)
            .await
            .map_err(|e| mount_failure(image, e))?;
        self.ctx.emit(AppEvent::Install(InstallEvent::ImageMounted {
            image: image.to_path_buf(),
            mountpoint: guard.mountpoint().to_path_buf(),
        }));
        Ok(guard)
    }

    async fn unmount(&self, guard: MountGuard) {
        let mountpoint = guard.mountpoint().to_path_buf();
        if let Err(e) = guard.release().await {
            self.ctx.emit_warning_with_context(
                format!("could not unmount {}", mountpoint.display()),
                e.to_string(),
            );
        }
    }
}
