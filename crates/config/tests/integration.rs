//! Integration tests for config

#[cfg(test)]
mod tests {
    use mia_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
managed_install_dir = "/tmp/mia"
receipts_dir = "/tmp/receipts"

[session]
suppress_pkgutil_forget = true
import_concurrency = 2
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.managed_install_dir(), PathBuf::from("/tmp/mia"));
        assert_eq!(config.receipts_dir(), PathBuf::from("/tmp/receipts"));
        assert_eq!(
            config.receipt_db_path(),
            PathBuf::from("/tmp/mia/b.receiptdb")
        );
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/mia/Cache"));
        assert!(config.session.suppress_pkgutil_forget);
        assert!(config.session.force_delete_bundles);
        assert_eq!(config.session.import_concurrency, 2);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_a_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[session\nimport_concurrency = ").unwrap();

        let err = Config::load_from_file(temp_file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            mia_errors::Error::Config(mia_errors::ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.install_info_path(),
            PathBuf::from("/Library/Managed Installs/InstallInfo.json")
        );
        assert_eq!(config.session.import_concurrency, 8);
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("MIA_MANAGED_INSTALL_DIR", "/var/mia");
        std::env::set_var("MIA_SUPPRESS_PKGUTIL_FORGET", "yes");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.managed_install_dir(), PathBuf::from("/var/mia"));
        assert!(config.session.suppress_pkgutil_forget);

        std::env::remove_var("MIA_MANAGED_INSTALL_DIR");
        std::env::remove_var("MIA_SUPPRESS_PKGUTIL_FORGET");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("MIA_IMPORT_CONCURRENCY", "0");

        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        std::env::remove_var("MIA_IMPORT_CONCURRENCY");
    }
}
