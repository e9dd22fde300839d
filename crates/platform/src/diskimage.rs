//! Disk image attach/detach and the RAII mount guard

use async_trait::async_trait;
use mia_errors::PlatformError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Attaches and detaches disk images
#[async_trait]
pub trait DiskImageMounter: Send + Sync {
    /// Attach `image` and return its mountpoints; `shadow` mounts it writable
    /// through a shadow file
    async fn mount(&self, image: &Path, shadow: bool) -> Result<Vec<PathBuf>, PlatformError>;

    async fn unmount(&self, mountpoint: &Path) -> Result<(), PlatformError>;
}

/// A mounted disk image that is detached on every exit path
///
/// Call [`MountGuard::release`] on the normal path to observe unmount
/// failures. If the guard is dropped while still mounted (early return,
/// error, cancellation) the unmount is spawned onto the runtime.
pub struct MountGuard {
    mounter: Arc<dyn DiskImageMounter>,
    image: PathBuf,
    mountpoint: Option<PathBuf>,
}

impl MountGuard {
    /// Mount `image` and keep its first mountpoint
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::MountFailed` when the image yields no mountpoint.
    pub async fn attach(
        mounter: Arc<dyn DiskImageMounter>,
        image: &Path,
        shadow: bool,
    ) -> Result<Self, PlatformError> {
        let mountpoints = mounter.mount(image, shadow).await?;
        let mut mountpoints = mountpoints.into_iter();
        let Some(first) = mountpoints.next() else {
            return Err(PlatformError::MountFailed {
                image: image.display().to_string(),
                message: "no filesystems mounted".to_string(),
            });
        };
        // Only the first volume is used; detach any others right away
        for extra in mountpoints {
            let _ = mounter.unmount(&extra).await;
        }

        Ok(Self {
            mounter,
            image: image.to_path_buf(),
            mountpoint: Some(first),
        })
    }

    /// The mounted volume
    #[must_use]
    pub fn mountpoint(&self) -> &Path {
        self.mountpoint
            .as_deref()
            .unwrap_or_else(|| Path::new("/"))
    }

    #[must_use]
    pub fn image(&self) -> &Path {
        &self.image
    }

    /// Detach the image now
    ///
    /// # Errors
    ///
    /// Returns the unmount failure reported by the mounter.
    pub async fn release(mut self) -> Result<(), PlatformError> {
        match self.mountpoint.take() {
            Some(mountpoint) => self.mounter.unmount(&mountpoint).await,
            None => Ok(()),
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        if let Some(mountpoint) = self.mountpoint.take() {
            // Best effort cleanup - ignore errors in destructor
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let mounter = Arc::clone(&self.mounter);
                handle.spawn(async move {
                    let _ = mounter.unmount(&mountpoint).await;
                });
            }
        }
    }
}
