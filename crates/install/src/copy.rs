//! Copying items out of a mounted disk image, and removing them again

use mia_errors::{InstallError, UninstallError};
use mia_events::{AppEvent, EventEmitter, InstallEvent};
use mia_platform::FileOwnership;
use mia_types::CopySpec;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::SessionContext;

fn copy_failed(message: impl Into<String>) -> InstallError {
    InstallError::CopyFailed {
        message: message.into(),
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

/// Directory the item lands in and the name it lands under
fn destination(spec: &CopySpec) -> Option<(PathBuf, Option<&str>)> {
    if let Some(path) = spec.destination_path.as_deref().filter(|p| !p.is_empty()) {
        return Some((PathBuf::from(path), spec.destination_item.as_deref()));
    }
    let item = Path::new(spec.destination_item.as_deref()?);
    let parent = item.parent().filter(|p| !p.as_os_str().is_empty())?;
    Some((parent.to_path_buf(), item.file_name()?.to_str()))
}

/// Create `dir` and any missing ancestors with the mode and owner of the
/// nearest existing ancestor
async fn create_inheriting(dir: &Path) -> Result<(), InstallError> {
    let mut missing = Vec::new();
    let mut cursor = dir;
    while !exists(cursor).await {
        missing.push(cursor.to_path_buf());
        cursor = cursor
            .parent()
            .ok_or_else(|| copy_failed(format!("no existing parent for {}", dir.display())))?;
    }

    let parent = tokio::fs::metadata(cursor)
        .await
        .map_err(|e| copy_failed(format!("cannot stat {}: {e}", cursor.display())))?;
    let mode = parent.permissions().mode() & 0o7777;
    let (uid, gid) = (parent.uid(), parent.gid());

    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(dir)
        .await
        .map_err(|e| copy_failed(format!("cannot create {}: {e}", dir.display())))?;

    tokio::task::spawn_blocking(move || {
        for path in missing.iter().rev() {
            std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(|e| {
                copy_failed(format!("cannot set owner of {}: {e}", path.display()))
            })?;
        }
        Ok::<(), InstallError>(())
    })
    .await
    .map_err(|e| copy_failed(e.to_string()))?
}

async fn remove_existing(path: &Path) -> std::io::Result<()> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Copy every spec from `mountpoint` onto the boot volume
///
/// Returns the installed paths. The first failing spec aborts the rest.
///
/// # Errors
///
/// Returns `InstallError::CopyFailed` for a malformed spec, a missing
/// source, or a failed copy or ownership change.
pub async fn copy_items_from_mountpoint(
    files: &dyn FileOwnership,
    mountpoint: &Path,
    specs: &[CopySpec],
    ctx: &SessionContext,
) -> Result<Vec<PathBuf>, InstallError> {
    let mut copied = Vec::with_capacity(specs.len());

    for spec in specs {
        let source_item = spec
            .source_item
            .as_deref()
            .filter(|item| !item.is_empty())
            .ok_or_else(|| copy_failed("missing name of item to copy"))?;
        let source = mountpoint.join(source_item);
        if !exists(&source).await {
            return Err(copy_failed(format!("source item {source_item} does not exist")));
        }

        let (dest_dir, dest_name) =
            destination(spec).ok_or_else(|| copy_failed("missing destination path for item"))?;
        if !exists(&dest_dir).await {
            ctx.emit_debug(format!(
                "destination {} does not exist, inheriting owner and mode from its parent",
                dest_dir.display()
            ));
            create_inheriting(&dest_dir).await?;
        }

        let name = dest_name
            .and_then(|name| Path::new(name).file_name())
            .or_else(|| Path::new(source_item).file_name())
            .ok_or_else(|| copy_failed(format!("cannot name destination for {source_item}")))?;
        let target = dest_dir.join(name);

        if exists(&target).await {
            remove_existing(&target).await.map_err(|e| {
                copy_failed(format!("error removing existing {}: {e}", target.display()))
            })?;
        }

        files
            .copy_item(&source, &target)
            .await
            .map_err(|e| copy_failed(e.to_string()))?;
        if let Err(e) = files.strip_quarantine(&target).await {
            ctx.emit_warning_with_context(
                format!("could not remove quarantine from {}", target.display()),
                e.to_string(),
            );
        }

        files
            .set_owner(&target, spec.user())
            .await
            .map_err(|e| copy_failed(e.to_string()))?;
        files
            .set_group(&target, spec.group())
            .await
            .map_err(|e| copy_failed(e.to_string()))?;
        files
            .set_mode(&target, spec.mode())
            .await
            .map_err(|e| copy_failed(e.to_string()))?;

        ctx.emit(AppEvent::Install(InstallEvent::ItemCopied {
            source,
            destination: target.clone(),
        }));
        copied.push(target);
    }

    Ok(copied)
}

/// Remove items previously copied out of a disk image
///
/// Absent items are only noted. The first malformed spec or failed removal
/// aborts the method.
///
/// # Errors
///
/// Returns `UninstallError::MissingRemovalSpec` for an empty list or a spec
/// without a name or destination, and `UninstallError::RemovalFailed` when a
/// path cannot be removed.
pub async fn remove_copied_items(
    specs: &[CopySpec],
    ctx: &SessionContext,
) -> Result<(), UninstallError> {
    if specs.is_empty() {
        return Err(UninstallError::MissingRemovalSpec {
            message: "nothing to remove".to_string(),
        });
    }

    for spec in specs {
        let name = spec
            .item_basename()
            .ok_or_else(|| UninstallError::MissingRemovalSpec {
                message: "missing item name to remove".to_string(),
            })?;
        let dest_dir = spec
            .destination_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| UninstallError::MissingRemovalSpec {
                message: format!("missing path for {name}"),
            })?;

        let path = Path::new(dest_dir).join(name);
        if exists(&path).await {
            remove_existing(&path)
                .await
                .map_err(|e| UninstallError::RemovalFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            ctx.emit_debug(format!("removed {}", path.display()));
        } else {
            ctx.emit_debug(format!("{} does not exist", path.display()));
        }
    }
    Ok(())
}
