#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for mia
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`~/.config/mia/config.toml`, then `/Library/Preferences/mia.toml`)
//! - Environment variables (`MIA_*`)
//! - CLI flags

pub mod constants;

use mia_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Path configuration; every unset path derives from `managed_install_dir`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub managed_install_dir: Option<PathBuf>,
    pub receipt_db: Option<PathBuf>,
    pub install_history: Option<PathBuf>,
    pub receipts_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep the OS package registry untouched when removing packages
    #[serde(default)]
    pub suppress_pkgutil_forget: bool,
    /// Remove non-empty bundle directories during package removal
    #[serde(default = "default_force_delete_bundles")]
    pub force_delete_bundles: bool,
    /// Parallel registry queries while rebuilding the receipt database
    #[serde(default = "default_import_concurrency")]
    pub import_concurrency: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            suppress_pkgutil_forget: false,
            force_delete_bundles: default_force_delete_bundles(),
            import_concurrency: default_import_concurrency(),
        }
    }
}

fn default_force_delete_bundles() -> bool {
    true
}

fn default_import_concurrency() -> usize {
    8
}

impl Config {
    /// Get the per-user config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("mia").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to the system file, then defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be read
    /// or parsed.
    pub async fn load() -> Result<Self, Error> {
        let user_path = Self::default_path().ok();
        let system_path = PathBuf::from(constants::SYSTEM_CONFIG);

        for candidate in user_path.into_iter().chain(std::iter::once(system_path)) {
            if candidate.exists() {
                return Self::load_from_file(&candidate).await;
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an optional path or use the default lookup
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds a value that cannot
    /// be parsed into the expected type.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(dir) = std::env::var("MIA_MANAGED_INSTALL_DIR") {
            self.paths.managed_install_dir = Some(PathBuf::from(dir));
        }

        if let Ok(db) = std::env::var("MIA_RECEIPT_DB") {
            self.paths.receipt_db = Some(PathBuf::from(db));
        }

        if let Ok(dir) = std::env::var("MIA_LOG_DIR") {
            self.paths.log_dir = Some(PathBuf::from(dir));
        }

        if let Ok(value) = std::env::var("MIA_SUPPRESS_PKGUTIL_FORGET") {
            self.session.suppress_pkgutil_forget = parse_bool("MIA_SUPPRESS_PKGUTIL_FORGET", value)?;
        }

        if let Ok(value) = std::env::var("MIA_FORCE_DELETE_BUNDLES") {
            self.session.force_delete_bundles = parse_bool("MIA_FORCE_DELETE_BUNDLES", value)?;
        }

        if let Ok(value) = std::env::var("MIA_IMPORT_CONCURRENCY") {
            let parsed: usize = value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "MIA_IMPORT_CONCURRENCY".to_string(),
                value: value.clone(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "MIA_IMPORT_CONCURRENCY".to_string(),
                    value,
                }
                .into());
            }
            self.session.import_concurrency = parsed;
        }

        Ok(())
    }

    /// Root of the agent's working directory
    #[must_use]
    pub fn managed_install_dir(&self) -> PathBuf {
        self.paths
            .managed_install_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::MANAGED_INSTALL_DIR))
    }

    /// Payload cache populated by the fetch stage
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.managed_install_dir().join(constants::CACHE_DIR_NAME)
    }

    #[must_use]
    pub fn receipt_db_path(&self) -> PathBuf {
        self.paths
            .receipt_db
            .clone()
            .unwrap_or_else(|| self.managed_install_dir().join(constants::RECEIPT_DB_NAME))
    }

    #[must_use]
    pub fn install_history_path(&self) -> PathBuf {
        self.paths
            .install_history
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::INSTALL_HISTORY))
    }

    #[must_use]
    pub fn receipts_dir(&self) -> PathBuf {
        self.paths
            .receipts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::RECEIPTS_DIR))
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.paths
            .log_dir
            .clone()
            .unwrap_or_else(|| self.managed_install_dir().join(constants::LOGS_DIR_NAME))
    }

    /// The resolved plan document
    #[must_use]
    pub fn install_info_path(&self) -> PathBuf {
        self.managed_install_dir().join(constants::INSTALL_INFO_NAME)
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.managed_install_dir().join(constants::REPORT_NAME)
    }

    #[must_use]
    pub fn self_serve_manifest_path(&self) -> PathBuf {
        self.managed_install_dir()
            .join(constants::SELF_SERVE_MANIFEST)
    }

    #[must_use]
    pub fn staged_os_installer_info_path(&self) -> PathBuf {
        self.managed_install_dir()
            .join(constants::STAGED_OS_INSTALLER_INFO)
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
