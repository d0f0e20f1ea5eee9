//! # recall-core
//!
//! Shared data model for Recall: parameterized, replayable API-call + SQL
//! pipelines ("recipes") extracted from successful executions.
//!
//! A [`Recipe`] is a template over named parameters. Its API steps are either
//! GraphQL queries with `{{name}}` text placeholders or REST calls whose
//! structured fields may contain `{"$param": "name"}` reference nodes. Its
//! SQL steps are text templates executed over the tables produced by the API
//! steps. An [`ExecutedCall`] records what actually ran, so a candidate
//! recipe can be proven to re-render byte-for-whitespace-equivalent to the
//! original before it is ever trusted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// Configuration types shared across Recall crates
pub mod config;

pub use config::{ConfigError, RecallConfig, RecipeConfig};

/// The transport family a recipe targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    /// A GraphQL endpoint addressed by a single URL.
    Graphql,
    /// A REST API described by an OpenAPI document, resolved against a base URL.
    Rest,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKind::Graphql => write!(f, "graphql"),
            ApiKind::Rest => write!(f, "rest"),
        }
    }
}

/// Declared type of a recipe parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl ParamType {
    /// Whether a provided JSON value is acceptable for this type.
    ///
    /// `null` is accepted for every type: optional parameters may carry a
    /// `null` default and callers may pass it back explicitly.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ParamType::Str => value.is_string(),
            ParamType::Int => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Bool => value.is_boolean(),
        }
    }

    /// JSON Schema type name for descriptor generation.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::Int => "integer",
            ParamType::Float => "number",
            ParamType::Bool => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => write!(f, "str"),
            ParamType::Int => write!(f, "int"),
            ParamType::Float => write!(f, "float"),
            ParamType::Bool => write!(f, "bool"),
        }
    }
}

/// Specification of one recipe parameter.
///
/// A parameter with no declared `default` is required at invocation time.
/// A declared `default` — including an explicit `null` — makes it optional.
/// The two cases are distinct on the wire (`default` key absent vs. present
/// with `null`), so deserialization captures presence, not just value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    /// Declared value type. Defaults to `str` when omitted.
    #[serde(rename = "type", default)]
    pub kind: ParamType,

    /// Default value. `None` means the key was absent (required parameter);
    /// `Some(Value::Null)` means an explicit `null` default.
    #[serde(
        default,
        deserialize_with = "value_if_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// Required parameters declare no default at all.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Capture a field as `Some(value)` whenever the key is present, even when
/// the value is JSON `null`. Combined with `#[serde(default)]`, an absent
/// key stays `None`.
fn value_if_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn default_step_name() -> String {
    "data".to_string()
}

/// One templated API step within a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecipeStep {
    /// A GraphQL query template with `{{name}}` text placeholders.
    Graphql {
        /// Output table name for the step's result.
        #[serde(default = "default_step_name")]
        name: String,
        /// Query text with `{{name}}` placeholders.
        query_template: String,
    },
    /// A REST call whose structured fields may contain `{"$param": "name"}`
    /// reference nodes at any depth.
    Rest {
        #[serde(default = "default_step_name")]
        name: String,
        method: String,
        path: String,
        #[serde(default)]
        path_params: Value,
        #[serde(default)]
        query_params: Value,
        #[serde(default)]
        body: Value,
    },
}

impl RecipeStep {
    pub fn kind(&self) -> ApiKind {
        match self {
            RecipeStep::Graphql { .. } => ApiKind::Graphql,
            RecipeStep::Rest { .. } => ApiKind::Rest,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RecipeStep::Graphql { name, .. } => name,
            RecipeStep::Rest { name, .. } => name,
        }
    }
}

/// A reusable, parameterized pipeline template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Recipe {
    /// Callable identifier chosen at extraction time (lowercase-start
    /// identifier, at most 40 characters).
    #[serde(default)]
    pub tool_name: String,

    /// Parameter name → specification.
    #[serde(default)]
    pub params: HashMap<String, ParamSpec>,

    /// Ordered API steps.
    #[serde(default)]
    pub steps: Vec<RecipeStep>,

    /// Ordered SQL text templates, executed after all API steps against the
    /// accumulated named result sets.
    #[serde(default)]
    pub sql_steps: Vec<String>,
}

/// One API call as it was originally executed, recorded from a successful
/// run. Candidate recipes are validated by re-rendering against these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutedCall {
    Graphql {
        #[serde(default = "default_step_name")]
        name: String,
        /// The exact query text that ran.
        #[serde(default)]
        query: String,
    },
    Rest {
        #[serde(default = "default_step_name")]
        name: String,
        method: String,
        path: String,
        #[serde(default)]
        path_params: Value,
        #[serde(default)]
        query_params: Value,
        #[serde(default)]
        body: Value,
    },
}

impl ExecutedCall {
    pub fn kind(&self) -> ApiKind {
        match self {
            ExecutedCall::Graphql { .. } => ApiKind::Graphql,
            ExecutedCall::Rest { .. } => ApiKind::Rest,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExecutedCall::Graphql { name, .. } => name,
            ExecutedCall::Rest { name, .. } => name,
        }
    }
}
