//! Routing a removal item to its uninstall mechanism

use mia_errors::{Error, InstallError, ReceiptError, UninstallError};
use mia_events::{AppEvent, EventEmitter, FailureContext, UninstallEvent};
use mia_platform::Platform;
use mia_receipts::ReceiptDb;
use mia_types::{EmbeddedScript, RemovalItem, UninstallMethod};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::copy::remove_copied_items;
use crate::installer::{InstallDispatcher, ItemOutcome};
use crate::removal::remove_filesystem_items;
use crate::{scripts, InstallConfig, SessionContext};

fn receipt_failure(err: Error) -> UninstallError {
    match err {
        Error::Uninstall(err) => err,
        Error::Receipt(ReceiptError::RebuildCancelled) => UninstallError::Cancelled,
        other => UninstallError::ReceiptDatabaseUnavailable {
            message: other.to_string(),
        },
    }
}

fn backend_failure(backend: impl Into<String>, code: i32) -> UninstallError {
    UninstallError::BackendExitNonZero {
        backend: backend.into(),
        code,
    }
}

/// Routes removal items to receipt-driven removal, uninstaller packages,
/// copied-item removal or uninstall scripts
///
/// The receipt database is opened on first use and kept for the session.
pub struct UninstallDispatcher<'a> {
    platform: &'a Platform,
    config: &'a InstallConfig,
    ctx: &'a SessionContext,
    receipts: OnceCell<ReceiptDb>,
}

impl<'a> UninstallDispatcher<'a> {
    #[must_use]
    pub fn new(platform: &'a Platform, config: &'a InstallConfig, ctx: &'a SessionContext) -> Self {
        Self {
            platform,
            config,
            ctx,
            receipts: OnceCell::new(),
        }
    }

    /// Run the pre-uninstall script, the uninstall method and the
    /// post-uninstall script
    pub async fn uninstall(&self, item: &RemovalItem) -> ItemOutcome {
        let meta = &item.meta;
        self.ctx.emit(AppEvent::Uninstall(UninstallEvent::Started {
            item: meta.name.clone(),
            version: meta.version().to_string(),
            method: item.method.method_name(),
        }));

        let result = match &item.pre_script {
            Some(script) => match self.run_script(&meta.name, script).await {
                0 => self.dispatch(item).await,
                code => Err(UninstallError::PreScriptFailed {
                    item: meta.name.clone(),
                    code,
                }),
            },
            None => self.dispatch(item).await,
        };

        let restart_needed = match result {
            Ok(restart_needed) => restart_needed,
            Err(err) => {
                let status = err.status_code();
                if err.is_cancellation() {
                    self.ctx
                        .emit_warning(format!("uninstall of {} was cancelled", meta.display()));
                }
                self.ctx.emit(AppEvent::Uninstall(UninstallEvent::Failed {
                    item: meta.name.clone(),
                    version: meta.version().to_string(),
                    status,
                    failure: FailureContext::from_error(&err),
                }));
                return ItemOutcome::failure(status);
            }
        };

        if let Some(script) = &item.post_script {
            let code = self.run_script(&meta.name, script).await;
            if code != 0 {
                self.ctx
                    .emit(AppEvent::Uninstall(UninstallEvent::PostScriptFailed {
                        item: meta.name.clone(),
                        code,
                    }));
            }
        }

        self.ctx.emit(AppEvent::Uninstall(UninstallEvent::Completed {
            item: meta.name.clone(),
            version: meta.version().to_string(),
            restart_needed,
        }));
        ItemOutcome::success(restart_needed)
    }

    async fn run_script(&self, item_name: &str, script: &EmbeddedScript) -> i32 {
        scripts::run_embedded(self.platform.scripts.as_ref(), self.ctx, item_name, script).await
    }

    /// Returns whether the item needs a restart
    async fn dispatch(&self, item: &RemovalItem) -> Result<bool, UninstallError> {
        let requires_restart = item.meta.restart_action.requires_restart();

        match &item.method {
            UninstallMethod::RemovePackages { packages } => {
                self.remove_packages(packages).await?;
                Ok(requires_restart)
            }
            UninstallMethod::UninstallPackage {
                uninstaller_item,
                package_path,
            } => {
                self.uninstall_package(item, uninstaller_item.as_deref(), package_path.as_deref())
                    .await
            }
            UninstallMethod::RemoveCopiedItems { items_to_remove } => {
                remove_copied_items(items_to_remove, self.ctx).await?;
                Ok(false)
            }
            UninstallMethod::UninstallScript { script } => {
                let script = script
                    .as_ref()
                    .ok_or_else(|| UninstallError::MissingRemovalSpec {
                        message: format!("{} has no uninstall_script", item.meta.name),
                    })?;
                match self.run_script(&item.meta.name, script).await {
                    0 => Ok(requires_restart),
                    code => Err(backend_failure("uninstall_script", code)),
                }
            }
            UninstallMethod::ExternalScript(path) => {
                if !is_executable(path).await {
                    return Err(UninstallError::UnsupportedUninstallMethod {
                        method: path.display().to_string(),
                    });
                }
                let code = scripts::run_executable(
                    self.platform.scripts.as_ref(),
                    self.ctx,
                    &item.meta.name,
                    path,
                )
                .await;
                match code {
                    0 => Ok(requires_restart),
                    code => Err(backend_failure(path.display().to_string(), code)),
                }
            }
            UninstallMethod::Retired(method) => Err(UninstallError::RetiredUninstallMethod {
                method: method.clone(),
            }),
            UninstallMethod::Unknown(method) => Err(UninstallError::UnsupportedUninstallMethod {
                method: method.clone(),
            }),
        }
    }

    async fn uninstall_package(
        &self,
        item: &RemovalItem,
        uninstaller_item: Option<&str>,
        package_path: Option<&str>,
    ) -> Result<bool, UninstallError> {
        let uninstaller_item = uninstaller_item.filter(|name| !name.is_empty()).ok_or_else(|| {
            UninstallError::MissingUninstallerPayload {
                item: item.meta.name.clone(),
                path: String::new(),
            }
        })?;
        let payload = self.config.cache_dir.join(uninstaller_item);
        if tokio::fs::symlink_metadata(&payload).await.is_err() {
            return Err(UninstallError::MissingUninstallerPayload {
                item: item.meta.name.clone(),
                path: payload.display().to_string(),
            });
        }

        let installer = InstallDispatcher::new(self.platform, self.config, self.ctx);
        let restart = installer
            .install_payload(&item.meta, &payload, package_path, false)
            .await
            .map_err(|err| match err {
                InstallError::Cancelled => UninstallError::Cancelled,
                other => backend_failure("installer", other.status_code()),
            })?;
        Ok(restart || item.meta.restart_action.requires_restart())
    }

    async fn receipts(&self) -> Result<&ReceiptDb, UninstallError> {
        self.receipts
            .get_or_try_init(|| async {
                let sender = self
                    .ctx
                    .event_sender
                    .clone()
                    .unwrap_or_else(|| mia_events::channel().0);
                ReceiptDb::open(
                    self.config.receipts.clone(),
                    Arc::clone(&self.platform.registry),
                    sender,
                    false,
                    &self.ctx.cancel,
                )
                .await
                .map_err(receipt_failure)
            })
            .await
    }

    /// Remove the paths owned only by `packages`, then their receipts
    async fn remove_packages(&self, packages: &[String]) -> Result<(), UninstallError> {
        if packages.is_empty() {
            return Err(UninstallError::NoPackagesDeclared);
        }
        if self.ctx.stop_requested() {
            return Err(UninstallError::Cancelled);
        }

        let db = self.receipts().await?;
        let keys = db.package_keys(packages).await.map_err(receipt_failure)?;
        if self.ctx.stop_requested() {
            return Err(UninstallError::Cancelled);
        }
        let paths = db
            .paths_owned_only_by(&keys)
            .await
            .map_err(receipt_failure)?;
        if self.ctx.stop_requested() {
            return Err(UninstallError::Cancelled);
        }

        self.ctx.emit(AppEvent::Uninstall(UninstallEvent::PathsSelected {
            packages: packages.to_vec(),
            paths: paths.len(),
        }));
        remove_filesystem_items(
            &self.config.filesystem_root,
            &paths,
            self.config.force_delete_bundles,
            self.ctx,
        )
        .await;

        db.remove_receipts(&keys, self.config.suppress_pkgutil_forget)
            .await
            .map_err(receipt_failure)
    }
}

async fn is_executable(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}
