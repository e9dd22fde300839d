//! Prerequisite token parsing and version normalization

/// Split a prerequisite token into a name and an optional version.
///
/// The double-hyphen delimiter is tried before the single hyphen, and the
/// token is split at the last occurrence. The trailing chunk only counts as a
/// version when it starts with an ASCII digit, so `Foo-Bar` is a bare name.
///
/// ```
/// use mia_types::split_name_and_version;
///
/// assert_eq!(split_name_and_version("TextWrangler-2.3b1"), ("TextWrangler", Some("2.3b1")));
/// assert_eq!(split_name_and_version("Photoshop--11.2.1"), ("Photoshop", Some("11.2.1")));
/// assert_eq!(split_name_and_version("Office-2008-12.2"), ("Office-2008", Some("12.2")));
/// assert_eq!(split_name_and_version("Foo-Bar"), ("Foo-Bar", None));
/// ```
#[must_use]
pub fn split_name_and_version(token: &str) -> (&str, Option<&str>) {
    for delim in ["--", "-"] {
        if let Some((name, version)) = token.rsplit_once(delim) {
            if version.starts_with(|c: char| c.is_ascii_digit()) {
                return (name, Some(version));
            }
        }
    }
    (token, None)
}

/// Normalize a version string for equality comparison.
///
/// A `+build` metadata suffix is dropped, then lone trailing `0` components
/// are trimmed while more than two components remain.
///
/// ```
/// use mia_types::normalize_version;
///
/// assert_eq!(normalize_version("10.0.0.0"), "10.0");
/// assert_eq!(normalize_version("10.0.0.1"), "10.0.0.1");
/// assert_eq!(normalize_version("1.2.0+77"), "1.2");
/// assert_eq!(normalize_version("10.0.0-abc1.0"), "10.0.0-abc1");
/// ```
#[must_use]
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    let version = version.split_once('+').map_or(version, |(core, _)| core);
    if version.is_empty() {
        return String::new();
    }

    let mut parts: Vec<&str> = version.split('.').collect();
    while parts.len() > 2 && parts.last() == Some(&"0") {
        parts.pop();
    }
    parts.join(".")
}
