use mia_config::Config;
use mia_receipts::ReceiptDbOptions;
use std::path::PathBuf;

/// Filesystem locations and switches for one session
#[derive(Clone, Debug)]
pub struct InstallConfig {
    /// Payload cache populated by the fetch stage
    pub cache_dir: PathBuf,
    pub install_info_path: PathBuf,
    pub report_path: PathBuf,
    pub log_dir: PathBuf,
    /// Receipt paths are relative to this directory
    pub filesystem_root: PathBuf,
    pub receipts: ReceiptDbOptions,
    pub suppress_pkgutil_forget: bool,
    pub force_delete_bundles: bool,
}

impl InstallConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_dir: config.cache_dir(),
            install_info_path: config.install_info_path(),
            report_path: config.report_path(),
            log_dir: config.log_dir(),
            filesystem_root: PathBuf::from("/"),
            receipts: ReceiptDbOptions {
                db_path: config.receipt_db_path(),
                install_history: config.install_history_path(),
                receipts_dir: config.receipts_dir(),
                import_concurrency: config.session.import_concurrency,
            },
            suppress_pkgutil_forget: config.session.suppress_pkgutil_forget,
            force_delete_bundles: config.session.force_delete_bundles,
        }
    }

    /// Root removal paths somewhere other than `/`
    #[must_use]
    pub fn with_filesystem_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.filesystem_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mia_config::PathConfig;

    #[test]
    fn paths_follow_the_managed_install_dir() {
        let config = Config {
            paths: PathConfig {
                managed_install_dir: Some("/tmp/mia".into()),
                ..PathConfig::default()
            },
            ..Config::default()
        };
        let install = InstallConfig::from_config(&config);
        assert_eq!(install.cache_dir, PathBuf::from("/tmp/mia/Cache"));
        assert_eq!(
            install.install_info_path,
            PathBuf::from("/tmp/mia/InstallInfo.json")
        );
        assert_eq!(install.receipts.db_path, PathBuf::from("/tmp/mia/b.receiptdb"));
        assert_eq!(install.filesystem_root, PathBuf::from("/"));
        assert!(install.force_delete_bundles);

        let install = install.with_filesystem_root("/Volumes/Target");
        assert_eq!(install.filesystem_root, PathBuf::from("/Volumes/Target"));
        assert_eq!(install.cache_dir, PathBuf::from("/tmp/mia/Cache"));
    }
}
