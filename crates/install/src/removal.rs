//! Deleting the filesystem paths selected from the receipt database

use mia_events::{AppEvent, EventEmitter, UninstallEvent};
use mia_platform::filesystem::{inside_bundle, is_bundle};
use std::path::{Path, PathBuf};

use crate::SessionContext;

const DS_STORE: &str = ".DS_Store";

/// Problems met while removing paths; none of them fails the removal
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: usize,
    pub problems: Vec<String>,
}

async fn entry_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Entry names of `dir`; a read failure is reported and yields `None`
async fn read_entries(
    dir: &Path,
    ctx: &SessionContext,
    report: &mut RemovalReport,
) -> Option<Vec<String>> {
    match entry_names(dir).await {
        Ok(names) => Some(names),
        Err(e) => {
            let message = format!("couldn't read directory {}: {e}", dir.display());
            ctx.emit_error(message.clone());
            report.problems.push(message);
            None
        }
    }
}

/// Remove `paths` (relative to `root`): files and symlinks first, then
/// directories deepest first
///
/// A directory holding only `.DS_Store` counts as empty. A non-empty bundle
/// is removed outright when `force_delete_bundles` is set; any other
/// non-empty directory is kept and reported, except inside a bundle that is
/// about to be force-removed.
pub async fn remove_filesystem_items(
    root: &Path,
    paths: &[String],
    force_delete_bundles: bool,
    ctx: &SessionContext,
) -> RemovalReport {
    let mut report = RemovalReport::default();
    let mut directories: Vec<PathBuf> = Vec::new();

    for relative in paths {
        let path = root.join(relative.trim_start_matches('/'));
        // symlink_metadata so broken links are still removed
        let Ok(metadata) = tokio::fs::symlink_metadata(&path).await else {
            continue;
        };
        if metadata.is_dir() {
            directories.push(path);
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                report.removed += 1;
                ctx.emit(AppEvent::Uninstall(UninstallEvent::PathRemoved {
                    path: path.display().to_string(),
                }));
            }
            Err(e) => {
                let message = format!("couldn't remove item {}: {e}", path.display());
                ctx.emit_error(message.clone());
                report.problems.push(message);
            }
        }
    }

    directories.sort_by(|a, b| b.cmp(a));
    for dir in directories {
        remove_directory(&dir, force_delete_bundles, ctx, &mut report).await;
    }

    if !report.problems.is_empty() {
        ctx.emit_warning(format!(
            "there were problems removing {} filesystem items",
            report.problems.len()
        ));
    }
    report
}

async fn remove_directory(
    dir: &Path,
    force_delete_bundles: bool,
    ctx: &SessionContext,
    report: &mut RemovalReport,
) {
    // Already gone with a force-removed bundle
    if tokio::fs::symlink_metadata(dir).await.is_err() {
        return;
    }

    let Some(mut names) = read_entries(dir, ctx, report).await else {
        return;
    };
    if names == [DS_STORE] {
        if let Err(e) = tokio::fs::remove_file(dir.join(DS_STORE)).await {
            ctx.emit_debug(format!("couldn't remove {}/{DS_STORE}: {e}", dir.display()));
        }
        let Some(remaining) = read_entries(dir, ctx, report).await else {
            return;
        };
        names = remaining;
    }

    if names.is_empty() {
        match tokio::fs::remove_dir(dir).await {
            Ok(()) => {
                report.removed += 1;
                ctx.emit(AppEvent::Uninstall(UninstallEvent::PathRemoved {
                    path: dir.display().to_string(),
                }));
            }
            Err(e) => {
                let message = format!("couldn't remove directory {}: {e}", dir.display());
                ctx.emit_error(message.clone());
                report.problems.push(message);
            }
        }
        return;
    }

    if force_delete_bundles && is_bundle(dir) {
        ctx.emit_warning(format!("removing non-empty bundle: {}", dir.display()));
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {
                report.removed += 1;
                ctx.emit(AppEvent::Uninstall(UninstallEvent::PathRemoved {
                    path: dir.display().to_string(),
                }));
            }
            Err(e) => {
                let message = format!("couldn't remove bundle {}: {e}", dir.display());
                ctx.emit_error(message.clone());
                report.problems.push(message);
            }
        }
        return;
    }

    ctx.emit(AppEvent::Uninstall(UninstallEvent::PathKept {
        path: dir.display().to_string(),
        reason: "not empty".to_string(),
    }));
    if !(force_delete_bundles && inside_bundle(dir)) {
        report
            .problems
            .push(format!("did not remove {} because it is not empty", dir.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn files_then_directories_deepest_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "opt/tool/bin/tool");
        touch(root, "opt/tool/share/.DS_Store");

        let report = remove_filesystem_items(
            root,
            &paths(&["opt/tool", "opt/tool/bin", "opt/tool/bin/tool", "opt/tool/share"]),
            true,
            &SessionContext::new(),
        )
        .await;

        assert!(report.problems.is_empty(), "{:?}", report.problems);
        assert!(!root.join("opt/tool").exists());
        assert!(root.join("opt").exists());
        assert_eq!(report.removed, 4);
    }

    #[tokio::test]
    async fn foreign_content_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "Library/Shared/ours.txt");
        touch(root, "Library/Shared/theirs.txt");

        let report = remove_filesystem_items(
            root,
            &paths(&["Library/Shared", "Library/Shared/ours.txt"]),
            true,
            &SessionContext::new(),
        )
        .await;

        assert!(root.join("Library/Shared/theirs.txt").exists());
        assert!(!root.join("Library/Shared/ours.txt").exists());
        assert_eq!(report.problems.len(), 1);
    }

    #[tokio::test]
    async fn non_empty_bundles_are_forced_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "Applications/Foo.app/Contents/Resources/user.plist");
        let selected = paths(&["Applications/Foo.app", "Applications/Foo.app/Contents"]);

        let kept =
            remove_filesystem_items(root, &selected, false, &SessionContext::new()).await;
        assert!(root.join("Applications/Foo.app").exists());
        assert_eq!(kept.problems.len(), 2);

        let forced = remove_filesystem_items(root, &selected, true, &SessionContext::new()).await;
        assert!(!root.join("Applications/Foo.app").exists());
        // Contents sits inside the bundle and is not reported
        assert!(forced.problems.is_empty(), "{:?}", forced.problems);
    }

    #[tokio::test]
    async fn unreadable_directory_is_reported_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "opt/not-a-dir");
        let target = dir.path().join("opt/not-a-dir");
        let mut report = RemovalReport::default();

        remove_directory(&target, true, &SessionContext::new(), &mut report).await;

        assert!(target.exists());
        assert_eq!(report.removed, 0);
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].starts_with("couldn't read directory"));
    }

    #[tokio::test]
    async fn missing_paths_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let report = remove_filesystem_items(
            dir.path(),
            &paths(&["usr/local/bin/gone"]),
            true,
            &SessionContext::new(),
        )
        .await;
        assert_eq!(report, RemovalReport::default());
    }
}
