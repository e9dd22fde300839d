//! The OS package registry (receipts written by the native installer)

use async_trait::async_trait;
use mia_errors::PlatformError;

/// Metadata for one registered package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub package_id: String,
    pub version: String,
    /// Seconds since the epoch
    pub install_time: i64,
    /// Install-root prefix, relative, without leading or trailing slashes
    pub location: String,
}

/// One installed path as recorded by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub path: String,
    pub uid: i64,
    pub gid: i64,
    pub mode: i64,
}

/// Read and forget access to the OS package registry
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Identifiers of every registered package
    async fn list_packages(&self) -> Result<Vec<String>, PlatformError>;

    async fn package_info(&self, package_id: &str) -> Result<PackageInfo, PlatformError>;

    async fn package_files(&self, package_id: &str) -> Result<Vec<PackageFile>, PlatformError>;

    /// Drop the package's receipt from the registry
    async fn forget(&self, package_id: &str) -> Result<(), PlatformError>;
}

/// Parse `key: value` package info output
///
/// Missing fields fall back to version `1.0`, install time `0` and an empty
/// location.
#[must_use]
pub fn parse_package_info(package_id: &str, text: &str) -> PackageInfo {
    let mut info = PackageInfo {
        package_id: package_id.to_string(),
        version: "1.0".to_string(),
        install_time: 0,
        location: String::new(),
    };

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "version" if !value.is_empty() => info.version = value.to_string(),
            "install-time" => info.install_time = value.parse().unwrap_or(0),
            "location" => info.location = normalize_location(value),
            _ => {}
        }
    }
    info
}

/// Strip `./` and `/` prefixes and trailing slashes from an install location
#[must_use]
pub fn normalize_location(location: &str) -> String {
    location
        .trim_start_matches(['.', '/'])
        .trim_end_matches('/')
        .to_string()
}

/// Parse one registry file line: a bare path, or `path<TAB>mode<TAB>uid/gid`
///
/// Returns `None` for blank lines.
#[must_use]
pub fn parse_file_line(line: &str) -> Option<PackageFile> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return None;
    }

    let mut fields = line.split('\t');
    let path = fields.next()?.to_string();
    let mode = fields
        .next()
        .and_then(|mode| i64::from_str_radix(mode, 8).ok())
        .unwrap_or(0);
    let (uid, gid) = fields
        .next()
        .and_then(|ids| ids.split_once('/'))
        .map_or((0, 0), |(uid, gid)| {
            (uid.parse().unwrap_or(0), gid.parse().unwrap_or(0))
        });

    Some(PackageFile {
        path,
        uid,
        gid,
        mode,
    })
}
