//! Naming for recipes exposed as standalone callables.
//!
//! Exposed names are `<prefix>_<slug>`: deterministic, lowercase,
//! underscore-separated, length-capped, and deduplicated with a numeric
//! suffix on collision.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Shape required of an extractor-chosen tool name: lowercase-start
/// identifier, at most 40 characters.
pub static TOOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,39}$").expect("tool name regex"));

/// Whether a tool name is acceptable as a callable identifier.
pub fn is_valid_tool_name(name: &str) -> bool {
    TOOL_NAME_RE.is_match(name)
}

/// Normalize an arbitrary name to a safe slug: lowercase, punctuation
/// stripped, whitespace runs collapsed to single underscores. Falls back to
/// `"recipe"` when nothing survives.
pub fn sanitize_tool_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('_')
        .to_string();
    if slug.is_empty() {
        "recipe".to_string()
    } else {
        slug
    }
}

/// Longest slug that fits within the exposed-name cap together with the
/// prefix and separator.
pub fn max_slug_len(max_tool_name_len: usize, prefix: &str) -> usize {
    max_tool_name_len.saturating_sub(prefix.len() + 1).max(1)
}

/// Truncate a slug to fit the exposed-name cap.
pub fn truncate_slug(slug: &str, max_tool_name_len: usize, prefix: &str) -> String {
    let cap = max_slug_len(max_tool_name_len, prefix);
    slug.chars().take(cap).collect()
}

/// Build the exposed tool name `<prefix>_<slug>`, truncating the slug when
/// the combination would exceed the cap.
pub fn exposed_tool_name(slug: &str, max_tool_name_len: usize, prefix: &str) -> String {
    let base = format!("{prefix}_{slug}");
    if base.len() <= max_tool_name_len {
        return base;
    }
    format!("{prefix}_{}", truncate_slug(slug, max_tool_name_len, prefix))
}

/// Ensure a unique name against an already-seen set, appending `_2`, `_3`, …
/// on collision. The chosen name is recorded in `seen`.
pub fn dedup_name(base: &str, seen: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut counter = 2;
    while seen.contains(&name) {
        name = format!("{base}_{counter}");
        counter += 1;
    }
    seen.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_shape() {
        assert!(is_valid_tool_name("get_recent_users"));
        assert!(is_valid_tool_name("a"));
        assert!(!is_valid_tool_name("GetUsers"));
        assert!(!is_valid_tool_name("1_users"));
        assert!(!is_valid_tool_name(""));
        assert!(!is_valid_tool_name(&"a".repeat(41)));
        assert!(is_valid_tool_name(&"a".repeat(40)));
    }

    #[test]
    fn sanitize_normalizes_to_slug() {
        assert_eq!(sanitize_tool_name("Find Top Hotels!"), "find_top_hotels");
        assert_eq!(sanitize_tool_name("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_tool_name("???"), "recipe");
        assert_eq!(sanitize_tool_name("already_fine"), "already_fine");
    }

    #[test]
    fn exposed_name_respects_cap() {
        let name = exposed_tool_name("short", 60, "r");
        assert_eq!(name, "r_short");

        let long = "x".repeat(100);
        let name = exposed_tool_name(&long, 60, "r");
        assert_eq!(name.len(), 60);
        assert!(name.starts_with("r_"));
    }

    #[test]
    fn dedup_appends_counter() {
        let mut seen = HashSet::new();
        assert_eq!(dedup_name("list_users", &mut seen), "list_users");
        assert_eq!(dedup_name("list_users", &mut seen), "list_users_2");
        assert_eq!(dedup_name("list_users", &mut seen), "list_users_3");
    }
}
