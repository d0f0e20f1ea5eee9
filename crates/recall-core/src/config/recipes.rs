//! Recipe cache configuration.

use serde::{Deserialize, Serialize};

/// Settings for the in-process recipe cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeConfig {
    /// Whether recipe extraction and replay are enabled at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of records retained; least-recently-used records are
    /// evicted beyond this bound.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum number of suggestions returned by a fuzzy lookup.
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: usize,

    /// Length cap for exposed tool names (prefix, separator, and slug).
    #[serde(default = "default_max_tool_name_len")]
    pub max_tool_name_len: usize,

    /// Prefix for exposed recipe tool names.
    #[serde(default = "default_tool_prefix")]
    pub tool_prefix: String,

    /// Row cap for result previews in replay reports.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_capacity(),
            suggest_limit: default_suggest_limit(),
            max_tool_name_len: default_max_tool_name_len(),
            tool_prefix: default_tool_prefix(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_capacity() -> usize {
    64
}

fn default_suggest_limit() -> usize {
    3
}

fn default_max_tool_name_len() -> usize {
    60
}

fn default_tool_prefix() -> String {
    "r".to_string()
}

fn default_preview_rows() -> usize {
    10
}
