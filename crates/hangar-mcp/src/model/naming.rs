//! Naming helpers for remote function identifiers.

use super::record::DeploymentId;

/// Convert a display name into a function-safe identifier.
///
/// Lowercases ASCII alphanumerics and collapses every other run of characters
/// into a single `-`. Leading and trailing separators are trimmed.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Compose a remote function name as
/// `<prefix><safe(owner)>-<safe(title)>-<short id>`.
///
/// Function names are global within a provisioning account and `safe_name`
/// is lossy, so the deployment id suffix keeps distinct `(owner, title)`
/// keys apart. Empty segments are skipped.
pub fn function_name_for(prefix: &str, owner: &str, title: &str, id: DeploymentId) -> String {
    let segments: Vec<String> = [safe_name(owner), safe_name(title), id.short()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    format!("{}{}", prefix, segments.join("-"))
}
