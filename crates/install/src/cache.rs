//! Payload cache eviction after a successful install

use mia_errors::Error;
use mia_platform::package::is_disk_image;
use mia_types::InstallItem;
use std::path::{Path, PathBuf};

use crate::prereqs::SkippedItem;

/// Whether `item`'s payload must stay in the cache
///
/// It stays when a later item in the list or a skipped item uses the same
/// payload, or when the item is both precached and on demand.
pub fn payload_still_needed<'a>(
    item: &InstallItem,
    later: impl IntoIterator<Item = Option<&'a str>>,
    skipped: &[SkippedItem],
) -> bool {
    let Some(payload) = item.installer_item.as_deref() else {
        return true;
    };
    if later.into_iter().any(|other| other == Some(payload)) {
        return true;
    }
    if item.meta.precache && item.meta.on_demand {
        return true;
    }
    skipped
        .iter()
        .any(|entry| entry.installer_item.as_deref() == Some(payload))
}

/// Delete a payload and, for disk images, its shadow file
///
/// Returns the removed path, or `None` when nothing was cached there.
///
/// # Errors
///
/// Returns an error if the payload exists but cannot be removed.
pub async fn evict_payload(cache_dir: &Path, installer_item: &str) -> Result<Option<PathBuf>, Error> {
    let path = cache_dir.join(installer_item);
    let Ok(metadata) = tokio::fs::symlink_metadata(&path).await else {
        return Ok(None);
    };

    if metadata.is_dir() {
        tokio::fs::remove_dir_all(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        return Ok(Some(path));
    }

    tokio::fs::remove_file(&path)
        .await
        .map_err(|e| Error::io_with_path(&e, &path))?;
    if is_disk_image(&path) {
        let shadow = shadow_path(&path);
        match tokio::fs::remove_file(&shadow).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_with_path(&e, shadow)),
        }
    }
    Ok(Some(path))
}

/// Shadow file written next to a disk image mounted writable
#[must_use]
pub fn shadow_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".shadow");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mia_types::{Installer, ItemMeta};

    fn item(payload: &str, precache: bool, on_demand: bool) -> InstallItem {
        InstallItem {
            meta: ItemMeta {
                name: "Foo".into(),
                precache,
                on_demand,
                ..ItemMeta::default()
            },
            installer: Installer::NoPkg,
            installer_item: Some(payload.to_string()),
            unattended: false,
            installed: false,
            pre_script: None,
            post_script: None,
        }
    }

    #[test]
    fn shared_payload_is_kept() {
        let current = item("Office.dmg", false, false);
        assert!(payload_still_needed(&current, [None, Some("Office.dmg")], &[]));
        assert!(!payload_still_needed(&current, [Some("Other.dmg")], &[]));

        let skipped = SkippedItem::from_meta(&current.meta, Some("Office.dmg"));
        assert!(payload_still_needed(&current, [], &[skipped]));
    }

    #[test]
    fn precached_on_demand_payload_is_kept() {
        assert!(payload_still_needed(&item("Zoom.pkg", true, true), [], &[]));
        assert!(!payload_still_needed(&item("Zoom.pkg", true, false), [], &[]));
    }

    #[tokio::test]
    async fn disk_image_and_shadow_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Foo.dmg"), b"img").unwrap();
        std::fs::write(dir.path().join("Foo.dmg.shadow"), b"shadow").unwrap();

        let removed = evict_payload(dir.path(), "Foo.dmg").await.unwrap();
        assert_eq!(removed, Some(dir.path().join("Foo.dmg")));
        assert!(!dir.path().join("Foo.dmg").exists());
        assert!(!dir.path().join("Foo.dmg.shadow").exists());
    }

    #[tokio::test]
    async fn bundle_payloads_are_removed_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Foo.pkg/Contents")).unwrap();
        std::fs::write(dir.path().join("Foo.pkg/Contents/Info.plist"), b"").unwrap();

        evict_payload(dir.path(), "Foo.pkg").await.unwrap();
        assert!(!dir.path().join("Foo.pkg").exists());
        assert_eq!(evict_payload(dir.path(), "Foo.pkg").await.unwrap(), None);
    }
}
