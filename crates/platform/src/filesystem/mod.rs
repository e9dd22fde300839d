//! Copy and ownership operations for items staged out of disk images

use async_trait::async_trait;
use mia_errors::PlatformError;
use std::path::Path;

/// Extended attribute stripped from every copied item
pub const QUARANTINE_XATTR: &str = "com.apple.quarantine";

/// Copies an item onto the boot volume and applies owner, group and mode
#[async_trait]
pub trait FileOwnership: Send + Sync {
    /// Copy `source` to `destination`, preserving metadata
    async fn copy_item(&self, source: &Path, destination: &Path) -> Result<(), PlatformError>;

    /// Remove the quarantine attribute recursively
    async fn strip_quarantine(&self, path: &Path) -> Result<(), PlatformError>;

    async fn set_owner(&self, path: &Path, user: &str) -> Result<(), PlatformError>;

    async fn set_group(&self, path: &Path, group: &str) -> Result<(), PlatformError>;

    /// Apply a symbolic or octal mode recursively
    async fn set_mode(&self, path: &Path, mode: &str) -> Result<(), PlatformError>;
}

/// Directory extensions that mark a bundle
pub const BUNDLE_EXTENSIONS: &[&str] = &[
    "action",
    "app",
    "bundle",
    "clr",
    "colorPicker",
    "component",
    "dictionary",
    "docset",
    "framework",
    "fs",
    "kext",
    "loginPlugin",
    "mdiimporter",
    "monitorPanel",
    "osax",
    "pkg",
    "plugin",
    "prefPane",
    "qlgenerator",
    "saver",
    "service",
    "slideSaver",
    "SpeechRecognizer",
    "SpeechSynthesizer",
    "SpeechVoice",
    "spreporter",
    "wdgt",
];

/// Whether `path` itself names a bundle
#[must_use]
pub fn is_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BUNDLE_EXTENSIONS.contains(&ext))
}

/// Whether any ancestor of `path` is a bundle
#[must_use]
pub fn inside_bundle(path: &Path) -> bool {
    path.ancestors().skip(1).any(is_bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundles_by_extension() {
        assert!(is_bundle(Path::new("/Applications/Tool.app")));
        assert!(is_bundle(Path::new("/Library/Extensions/Foo.kext")));
        assert!(!is_bundle(Path::new("/Applications/Tool")));
        assert!(!is_bundle(Path::new("/Applications/readme.txt")));
    }

    #[test]
    fn nested_paths() {
        assert!(inside_bundle(Path::new(
            "/Applications/Tool.app/Contents/MacOS/Tool"
        )));
        assert!(!inside_bundle(Path::new("/Applications/Tool.app")));
        assert!(!inside_bundle(Path::new("/usr/local/bin/tool")));
    }
}
