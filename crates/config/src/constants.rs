//! Fixed filesystem locations used when the configuration leaves a path unset

pub const MANAGED_INSTALL_DIR: &str = "/Library/Managed Installs";

pub const INSTALL_HISTORY: &str = "/Library/Receipts/InstallHistory.plist";
pub const RECEIPTS_DIR: &str = "/private/var/db/receipts";

/// System-wide configuration file consulted when no user file exists
pub const SYSTEM_CONFIG: &str = "/Library/Preferences/mia.toml";

pub const RECEIPT_DB_NAME: &str = "b.receiptdb";
pub const CACHE_DIR_NAME: &str = "Cache";
pub const LOGS_DIR_NAME: &str = "Logs";
pub const INSTALL_INFO_NAME: &str = "InstallInfo.json";
pub const REPORT_NAME: &str = "ManagedInstallReport.json";
pub const SELF_SERVE_MANIFEST: &str = "manifests/SelfServeManifest.json";
pub const STAGED_OS_INSTALLER_INFO: &str = "StagedOSInstaller.json";
