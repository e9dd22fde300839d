//! Prerequisite gating against this session's skipped and failed items
//!
//! Tokens in `requires` and `update_for` are matched only against items
//! skipped earlier in the same list, never against what is installed.

use mia_types::{normalize_version, split_name_and_version, InstallItem, ItemMeta, RemovalItem};
use serde_json::Value;

/// Version recorded for a skipped item that declares none
const UNVERSIONED: &str = "0.0";

/// What the gate remembers about an item that was skipped or failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub name: String,
    /// Normalized `version_to_install`
    pub version: String,
    /// The item's own `requires` and `update_for` tokens
    pub prerequisites: Vec<String>,
    pub installer_item: Option<String>,
}

impl SkippedItem {
    #[must_use]
    pub fn from_meta(meta: &ItemMeta, installer_item: Option<&str>) -> Self {
        let version = meta
            .version_to_install
            .as_deref()
            .map(normalize_version)
            .filter(|version| !version.is_empty())
            .unwrap_or_else(|| UNVERSIONED.to_string());
        Self {
            name: meta.name.clone(),
            version,
            prerequisites: meta.prerequisite_tokens().map(str::to_string).collect(),
            installer_item: installer_item.map(str::to_string),
        }
    }
}

impl SkippedItem {
    /// Build from a plan row that failed to parse as an item
    ///
    /// Only the fields the gate needs are read; a row without a name cannot be
    /// referenced by anything and yields `None`.
    #[must_use]
    pub fn from_row(row: &Value) -> Option<Self> {
        let name = row.get("name").and_then(Value::as_str)?;
        let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);
        let meta = ItemMeta {
            name: name.to_string(),
            version_to_install: text("version_to_install"),
            requires: string_list(row.get("requires")),
            update_for: string_list(row.get("update_for")),
            ..ItemMeta::default()
        };
        Some(Self::from_meta(&meta, text("installer_item").as_deref()))
    }
}

/// A single string or an array of strings
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(token)) => vec![token.clone()],
        Some(Value::Array(tokens)) => tokens
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl From<&InstallItem> for SkippedItem {
    fn from(item: &InstallItem) -> Self {
        Self::from_meta(&item.meta, item.installer_item.as_deref())
    }
}

impl From<&RemovalItem> for SkippedItem {
    fn from(item: &RemovalItem) -> Self {
        Self::from_meta(&item.meta, None)
    }
}

fn token_matches(token: &str, skipped: &SkippedItem) -> bool {
    let (name, version) = split_name_and_version(token);
    if name != skipped.name {
        return false;
    }
    version.is_none_or(|version| normalize_version(version) == skipped.version)
}

/// Prerequisite tokens of `item` that reference a skipped item
///
/// A versionless token matches any skipped item of that name; a versioned
/// token only matches when the normalized versions are equal.
#[must_use]
pub fn matched_skipped_prerequisites(item: &ItemMeta, skipped: &[SkippedItem]) -> Vec<String> {
    if skipped.is_empty() {
        return Vec::new();
    }
    item.prerequisite_tokens()
        .filter(|token| skipped.iter().any(|entry| token_matches(token, entry)))
        .map(str::to_string)
        .collect()
}

/// Names of skipped items that require, or are an update for, `item`
#[must_use]
pub fn matched_dependents(item: &ItemMeta, skipped: &[SkippedItem]) -> Vec<String> {
    skipped
        .iter()
        .filter(|entry| {
            entry
                .prerequisites
                .iter()
                .any(|token| split_name_and_version(token).0 == item.name)
        })
        .map(|entry| entry.name.clone())
        .collect()
}
