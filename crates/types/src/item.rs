//! Typed install and removal plan items

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fields shared by install and removal items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMeta {
    pub name: String,
    pub display_name: Option<String>,
    pub version_to_install: Option<String>,
    pub requires: Vec<String>,
    pub update_for: Vec<String>,
    pub restart_action: RestartAction,
    pub on_demand: bool,
    pub precache: bool,
    pub blocking_applications: Vec<String>,
}

impl ItemMeta {
    /// Name shown in logs and reports
    #[must_use]
    pub fn display(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }

    /// Version for log lines, empty when the plan row carries none
    #[must_use]
    pub fn version(&self) -> &str {
        self.version_to_install.as_deref().unwrap_or("")
    }

    /// Every prerequisite token (`requires` followed by `update_for`)
    pub fn prerequisite_tokens(&self) -> impl Iterator<Item = &str> {
        self.requires
            .iter()
            .chain(self.update_for.iter())
            .map(String::as_str)
    }
}

/// Restart behaviour declared by an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartAction {
    #[default]
    None,
    RequireRestart,
    RecommendRestart,
    RequireLogout,
    RequireShutdown,
}

impl RestartAction {
    /// Parse the plan's restart action string; unknown values mean no action
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "RequireRestart" => Self::RequireRestart,
            "RecommendRestart" => Self::RecommendRestart,
            "RequireLogout" => Self::RequireLogout,
            "RequireShutdown" => Self::RequireShutdown,
            _ => Self::None,
        }
    }

    /// Whether completing the item requires a restart of the machine
    #[must_use]
    pub fn requires_restart(self) -> bool {
        matches!(self, Self::RequireRestart | Self::RecommendRestart)
    }
}

/// Which embedded script slot a script came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
    Uninstall,
}

impl ScriptKind {
    /// Name used in log messages and temp file names
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PreInstall => "preinstall_script",
            Self::PostInstall => "postinstall_script",
            Self::PreUninstall => "preuninstall_script",
            Self::PostUninstall => "postuninstall_script",
            Self::Uninstall => "uninstall_script",
        }
    }
}

/// A script body carried inline by a plan item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedScript {
    pub kind: ScriptKind,
    pub body: String,
}

impl EmbeddedScript {
    pub fn new(kind: ScriptKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }
}

/// One item copied out of (or removed after being copied out of) a disk image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    #[serde(default)]
    pub source_item: Option<String>,
    #[serde(default)]
    pub destination_path: Option<String>,
    #[serde(default)]
    pub destination_item: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl CopySpec {
    pub const DEFAULT_USER: &'static str = "root";
    pub const DEFAULT_GROUP: &'static str = "admin";
    pub const DEFAULT_MODE: &'static str = "o-w";

    #[must_use]
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(Self::DEFAULT_USER)
    }

    #[must_use]
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or(Self::DEFAULT_GROUP)
    }

    #[must_use]
    pub fn mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(Self::DEFAULT_MODE)
    }

    /// Basename of the installed item: `destination_item` when given,
    /// otherwise `source_item`
    #[must_use]
    pub fn item_basename(&self) -> Option<&str> {
        let item = self
            .destination_item
            .as_deref()
            .or(self.source_item.as_deref())?;
        std::path::Path::new(item)
            .file_name()
            .and_then(|name| name.to_str())
    }
}

/// Installer backend selected by an install item's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installer {
    PackageInstall {
        package_path: Option<String>,
        suppress_bundle_relocation: bool,
    },
    CopyFromDmg {
        items_to_copy: Vec<CopySpec>,
    },
    StageOsInstaller {
        items_to_copy: Vec<CopySpec>,
    },
    StartOsInstall,
    NoPkg,
    /// A type the agent used to support
    Retired(String),
    /// A type the agent never supported
    Unknown(String),
}

impl Installer {
    /// Whether the installer reads a payload from the cache
    #[must_use]
    pub fn needs_payload(&self) -> bool {
        !matches!(self, Self::NoPkg | Self::StartOsInstall)
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::PackageInstall { .. } => "pkg_install",
            Self::CopyFromDmg { .. } => "copy_from_dmg",
            Self::StageOsInstaller { .. } => "stage_os_installer",
            Self::StartOsInstall => "startosinstall",
            Self::NoPkg => "nopkg",
            Self::Retired(name) | Self::Unknown(name) => name,
        }
    }
}

/// A typed row of the install plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallItem {
    pub meta: ItemMeta,
    pub installer: Installer,
    /// Cache-relative payload locator
    pub installer_item: Option<String>,
    pub unattended: bool,
    /// Rows already marked installed are not processed
    pub installed: bool,
    pub pre_script: Option<EmbeddedScript>,
    pub post_script: Option<EmbeddedScript>,
}

impl InstallItem {
    /// Path of the payload inside the cache directory
    #[must_use]
    pub fn payload_path(&self, cache_dir: &std::path::Path) -> Option<PathBuf> {
        self.installer_item
            .as_deref()
            .map(|item| cache_dir.join(item))
    }
}

/// Uninstall mechanism selected by a removal item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallMethod {
    RemovePackages {
        packages: Vec<String>,
    },
    UninstallPackage {
        uninstaller_item: Option<String>,
        package_path: Option<String>,
    },
    RemoveCopiedItems {
        items_to_remove: Vec<CopySpec>,
    },
    UninstallScript {
        script: Option<EmbeddedScript>,
    },
    ExternalScript(PathBuf),
    Retired(String),
    Unknown(String),
}

impl UninstallMethod {
    #[must_use]
    pub fn method_name(&self) -> String {
        match self {
            Self::RemovePackages { .. } => "removepackages".to_string(),
            Self::UninstallPackage { .. } => "uninstall_package".to_string(),
            Self::RemoveCopiedItems { .. } => "remove_copied_items".to_string(),
            Self::UninstallScript { .. } => "uninstall_script".to_string(),
            Self::ExternalScript(path) => path.display().to_string(),
            Self::Retired(name) | Self::Unknown(name) => name.clone(),
        }
    }
}

/// A typed row of the removal plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalItem {
    pub meta: ItemMeta,
    pub method: UninstallMethod,
    pub unattended: bool,
    /// Only installed items are processed
    pub installed: bool,
    pub pre_script: Option<EmbeddedScript>,
    pub post_script: Option<EmbeddedScript>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_falls_back_to_name() {
        let mut meta = ItemMeta {
            name: "Firefox".into(),
            ..ItemMeta::default()
        };
        assert_eq!(meta.display(), "Firefox");
        meta.display_name = Some(String::new());
        assert_eq!(meta.display(), "Firefox");
        meta.display_name = Some("Mozilla Firefox".into());
        assert_eq!(meta.display(), "Mozilla Firefox");
    }

    #[test]
    fn copy_spec_defaults() {
        let spec = CopySpec {
            source_item: Some("Foo.app".into()),
            ..CopySpec::default()
        };
        assert_eq!(spec.user(), "root");
        assert_eq!(spec.group(), "admin");
        assert_eq!(spec.mode(), "o-w");
        assert_eq!(spec.item_basename(), Some("Foo.app"));
    }

    #[test]
    fn destination_item_wins_for_basename() {
        let spec = CopySpec {
            source_item: Some("Payload/Foo.app".into()),
            destination_item: Some("Bar.app".into()),
            ..CopySpec::default()
        };
        assert_eq!(spec.item_basename(), Some("Bar.app"));
    }

    #[test]
    fn only_restart_actions_require_restart() {
        assert!(RestartAction::RequireRestart.requires_restart());
        assert!(RestartAction::RecommendRestart.requires_restart());
        assert!(!RestartAction::RequireLogout.requires_restart());
        assert!(!RestartAction::None.requires_restart());
    }
}
