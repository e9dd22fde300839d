//! Install plan document and the conversion of raw rows into typed items

use mia_errors::PlanError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::item::{
    CopySpec, EmbeddedScript, InstallItem, Installer, ItemMeta, RemovalItem, RestartAction,
    ScriptKind, UninstallMethod,
};

/// The plan document produced by the resolver
///
/// Rows are kept as raw JSON objects so that fields this engine does not read
/// survive a load/save round trip of the residual plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallInfo {
    #[serde(default)]
    pub managed_installs: Vec<Value>,
    #[serde(default)]
    pub removals: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_installs: Vec<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A plan row together with its typed form
///
/// `item` is an error when the row could not be converted; such rows are
/// reported and carried over into the residual plan untouched.
#[derive(Debug, Clone)]
pub struct PlanEntry<T> {
    pub raw: Value,
    pub item: Result<T, PlanError>,
}

impl<T> PlanEntry<T>
where
    T: TryFrom<RawPlanItem, Error = PlanError>,
{
    /// Convert a raw row
    pub fn from_value(raw: Value) -> Self {
        let item = RawPlanItem::from_value(&raw).and_then(T::try_from);
        Self { raw, item }
    }
}

impl InstallInfo {
    #[must_use]
    pub fn install_entries(&self) -> Vec<PlanEntry<InstallItem>> {
        self.managed_installs
            .iter()
            .cloned()
            .map(PlanEntry::from_value)
            .collect()
    }

    #[must_use]
    pub fn removal_entries(&self) -> Vec<PlanEntry<RemovalItem>> {
        self.removals
            .iter()
            .cloned()
            .map(PlanEntry::from_value)
            .collect()
    }
}

/// Permissive form of a plan row, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub version_to_install: Option<String>,
    #[serde(default)]
    pub installer_type: Option<String>,
    #[serde(default)]
    pub uninstall_method: Option<String>,
    #[serde(default)]
    pub installer_item: Option<String>,
    #[serde(default)]
    pub uninstaller_item: Option<String>,
    #[serde(default)]
    pub package_path: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub requires: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub update_for: Vec<String>,
    #[serde(default)]
    pub unattended_install: bool,
    #[serde(default)]
    pub unattended_uninstall: bool,
    #[serde(default, rename = "RestartAction")]
    pub restart_action: Option<String>,
    #[serde(default, rename = "OnDemand")]
    pub on_demand: bool,
    #[serde(default)]
    pub precache: bool,
    #[serde(default)]
    pub installed: Option<bool>,
    #[serde(default)]
    pub suppress_bundle_relocation: bool,
    #[serde(default)]
    pub blocking_applications: Option<Vec<String>>,
    #[serde(default)]
    pub installs: Vec<Value>,
    #[serde(default)]
    pub preinstall_script: Option<String>,
    #[serde(default)]
    pub postinstall_script: Option<String>,
    #[serde(default)]
    pub preuninstall_script: Option<String>,
    #[serde(default)]
    pub postuninstall_script: Option<String>,
    #[serde(default)]
    pub uninstall_script: Option<String>,
    #[serde(default)]
    pub items_to_copy: Vec<CopySpec>,
    #[serde(default)]
    pub items_to_remove: Vec<CopySpec>,
    #[serde(default)]
    pub packages: Vec<String>,
}

impl RawPlanItem {
    /// Deserialize a raw row, naming it in the error when possible
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidItem` when the row is not an object of the
    /// expected shape.
    pub fn from_value(value: &Value) -> Result<Self, PlanError> {
        serde_json::from_value(value.clone()).map_err(|err| PlanError::InvalidItem {
            name: value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string(),
            message: err.to_string(),
        })
    }

    fn meta(&self) -> ItemMeta {
        ItemMeta {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            version_to_install: self.version_to_install.clone(),
            requires: self.requires.clone(),
            update_for: self.update_for.clone(),
            restart_action: self
                .restart_action
                .as_deref()
                .map(RestartAction::parse)
                .unwrap_or_default(),
            on_demand: self.on_demand,
            precache: self.precache,
            blocking_applications: self.blocking_applications(),
        }
    }

    /// Declared blocking applications, or the bundles the item installs
    fn blocking_applications(&self) -> Vec<String> {
        if let Some(apps) = &self.blocking_applications {
            return apps.clone();
        }
        self.installs
            .iter()
            .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("application"))
            .filter_map(|entry| entry.get("path").and_then(Value::as_str))
            .filter_map(|path| std::path::Path::new(path).file_name()?.to_str())
            .map(str::to_string)
            .collect()
    }

    fn require_name(&self) -> Result<(), PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::InvalidItem {
                name: "<unnamed>".to_string(),
                message: "item has no name".to_string(),
            });
        }
        Ok(())
    }

    fn installer(&self) -> Installer {
        match self.installer_type.as_deref().unwrap_or_default() {
            "" => Installer::PackageInstall {
                package_path: self.package_path.clone(),
                suppress_bundle_relocation: self.suppress_bundle_relocation,
            },
            "copy_from_dmg" => Installer::CopyFromDmg {
                items_to_copy: self.items_to_copy.clone(),
            },
            "stage_os_installer" => Installer::StageOsInstaller {
                items_to_copy: self.items_to_copy.clone(),
            },
            "startosinstall" => Installer::StartOsInstall,
            "nopkg" => Installer::NoPkg,
            other if is_retired_installer_type(other) => Installer::Retired(other.to_string()),
            other => Installer::Unknown(other.to_string()),
        }
    }

    fn uninstall_method(&self) -> UninstallMethod {
        match self.uninstall_method.as_deref().unwrap_or_default() {
            "removepackages" => UninstallMethod::RemovePackages {
                packages: self.packages.clone(),
            },
            "uninstall_package" => UninstallMethod::UninstallPackage {
                uninstaller_item: self.uninstaller_item.clone(),
                package_path: self.package_path.clone(),
            },
            "remove_copied_items" => UninstallMethod::RemoveCopiedItems {
                items_to_remove: self.items_to_remove.clone(),
            },
            "uninstall_script" => UninstallMethod::UninstallScript {
                script: script(ScriptKind::Uninstall, self.uninstall_script.as_ref()),
            },
            path if path.starts_with('/') => UninstallMethod::ExternalScript(path.into()),
            other if is_retired_uninstall_method(other) => {
                UninstallMethod::Retired(other.to_string())
            }
            other => UninstallMethod::Unknown(other.to_string()),
        }
    }
}

impl TryFrom<RawPlanItem> for InstallItem {
    type Error = PlanError;

    fn try_from(raw: RawPlanItem) -> Result<Self, Self::Error> {
        raw.require_name()?;
        let installer = raw.installer();
        let installer_item = raw
            .installer_item
            .clone()
            .filter(|item| !item.is_empty());

        let payload_required = matches!(
            installer,
            Installer::PackageInstall { .. }
                | Installer::CopyFromDmg { .. }
                | Installer::StageOsInstaller { .. }
        );
        if payload_required && installer_item.is_none() {
            return Err(PlanError::InvalidItem {
                name: raw.name.clone(),
                message: "item has no installer_item".to_string(),
            });
        }

        Ok(Self {
            meta: raw.meta(),
            installer,
            installer_item,
            unattended: raw.unattended_install,
            installed: raw.installed.unwrap_or(false),
            pre_script: script(ScriptKind::PreInstall, raw.preinstall_script.as_ref()),
            post_script: script(ScriptKind::PostInstall, raw.postinstall_script.as_ref()),
        })
    }
}

impl TryFrom<RawPlanItem> for RemovalItem {
    type Error = PlanError;

    fn try_from(raw: RawPlanItem) -> Result<Self, Self::Error> {
        raw.require_name()?;
        Ok(Self {
            meta: raw.meta(),
            method: raw.uninstall_method(),
            unattended: raw.unattended_uninstall,
            installed: raw.installed.unwrap_or(false),
            pre_script: script(ScriptKind::PreUninstall, raw.preuninstall_script.as_ref()),
            post_script: script(ScriptKind::PostUninstall, raw.postuninstall_script.as_ref()),
        })
    }
}

fn script(kind: ScriptKind, body: Option<&String>) -> Option<EmbeddedScript> {
    body.filter(|body| !body.trim().is_empty())
        .map(|body| EmbeddedScript::new(kind, body.clone()))
}

fn is_retired_installer_type(installer_type: &str) -> bool {
    matches!(installer_type, "appdmg" | "profile") || installer_type.starts_with("Adobe")
}

fn is_retired_uninstall_method(method: &str) -> bool {
    matches!(method, "remove_app" | "remove_profile") || method.starts_with("Adobe")
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
        OneOrMany::Null(()) => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_installer_type_is_a_package_install() {
        let entry: PlanEntry<InstallItem> = PlanEntry::from_value(json!({
            "name": "Firefox",
            "installer_item": "Firefox-120.dmg",
            "package_path": "Firefox.pkg",
        }));
        let item = entry.item.unwrap();
        assert_eq!(
            item.installer,
            Installer::PackageInstall {
                package_path: Some("Firefox.pkg".into()),
                suppress_bundle_relocation: false,
            }
        );
    }

    #[test]
    fn requires_accepts_a_single_string() {
        let raw = RawPlanItem::from_value(&json!({
            "name": "Plugin",
            "requires": "Host-1.0",
        }))
        .unwrap();
        assert_eq!(raw.requires, vec!["Host-1.0".to_string()]);
    }

    #[test]
    fn package_install_without_payload_is_invalid() {
        let entry: PlanEntry<InstallItem> = PlanEntry::from_value(json!({"name": "Foo"}));
        assert!(matches!(entry.item, Err(PlanError::InvalidItem { .. })));
    }

    #[test]
    fn nopkg_needs_no_payload() {
        let entry: PlanEntry<InstallItem> =
            PlanEntry::from_value(json!({"name": "Foo", "installer_type": "nopkg"}));
        assert_eq!(entry.item.unwrap().installer, Installer::NoPkg);
    }

    #[test]
    fn retired_and_unknown_types_are_distinguished() {
        let retired: PlanEntry<InstallItem> = PlanEntry::from_value(json!({
            "name": "CS6", "installer_type": "AdobeCS5Installer", "installer_item": "cs6.dmg"
        }));
        assert_eq!(
            retired.item.unwrap().installer,
            Installer::Retired("AdobeCS5Installer".into())
        );

        let unknown: PlanEntry<InstallItem> = PlanEntry::from_value(json!({
            "name": "Foo", "installer_type": "flatpak", "installer_item": "foo"
        }));
        assert_eq!(
            unknown.item.unwrap().installer,
            Installer::Unknown("flatpak".into())
        );
    }

    #[test]
    fn uninstall_methods_parse() {
        let removal = |method: &str| -> UninstallMethod {
            let entry: PlanEntry<RemovalItem> = PlanEntry::from_value(json!({
                "name": "Foo", "uninstall_method": method, "installed": true
            }));
            entry.item.unwrap().method
        };
        assert!(matches!(
            removal("removepackages"),
            UninstallMethod::RemovePackages { .. }
        ));
        assert_eq!(
            removal("/usr/local/bin/foo-uninstall"),
            UninstallMethod::ExternalScript("/usr/local/bin/foo-uninstall".into())
        );
        assert_eq!(
            removal("remove_app"),
            UninstallMethod::Retired("remove_app".into())
        );
        assert_eq!(removal("bogus"), UninstallMethod::Unknown("bogus".into()));
    }

    #[test]
    fn blocking_applications_fall_back_to_installed_apps() {
        let entry: PlanEntry<InstallItem> = PlanEntry::from_value(json!({
            "name": "Firefox",
            "installer_item": "Firefox.dmg",
            "installs": [
                {"type": "application", "path": "/Applications/Firefox.app"},
                {"type": "file", "path": "/usr/local/bin/firefox"},
            ],
        }));
        assert_eq!(
            entry.item.unwrap().meta.blocking_applications,
            vec!["Firefox.app".to_string()]
        );

        let declared: PlanEntry<InstallItem> = PlanEntry::from_value(json!({
            "name": "Firefox",
            "installer_item": "Firefox.dmg",
            "blocking_applications": [],
            "installs": [{"type": "application", "path": "/Applications/Firefox.app"}],
        }));
        assert!(declared.item.unwrap().meta.blocking_applications.is_empty());
    }

    #[test]
    fn unknown_fields_survive_in_raw() {
        let info: InstallInfo = serde_json::from_value(json!({
            "managed_installs": [{"name": "Foo", "installer_type": "nopkg", "catalogs": ["prod"]}],
            "processed_installs": ["Bar"],
        }))
        .unwrap();
        let entries = info.install_entries();
        assert_eq!(entries[0].raw["catalogs"], json!(["prod"]));
        assert!(info.other.contains_key("processed_installs"));
    }
}
