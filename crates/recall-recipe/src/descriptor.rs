//! Exposing stored recipes as uniform callable descriptors.
//!
//! Instead of materializing a distinct function per recipe, every recipe is
//! described by a [`ToolDescriptor`]: an exposed name, a human-readable
//! description, and a flat JSON Schema derived once from the recipe's
//! parameter spec. A host pairs a descriptor with the generic invoker
//! (`RecipeRunner::run` with `(recipe_id, parameter map)`).

use crate::naming::{dedup_name, exposed_tool_name, max_slug_len, sanitize_tool_name};
use crate::store::{RecipeRecord, RecipeStore, RecipeSuggestion};
use recall_core::{ApiKind, ParamSpec, Recipe, RecipeConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A recipe exposed as a standalone callable operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Build the flat input schema for a recipe's calling convention.
///
/// Every declared parameter is a top-level property; parameters without a
/// default are required. `return_directly` is always present as an optional
/// boolean controlling the output form.
pub fn build_input_schema(params: &HashMap<String, ParamSpec>) -> Value {
    // Deterministic property order regardless of map iteration.
    let ordered: BTreeMap<&String, &ParamSpec> = params.iter().collect();

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, spec) in ordered {
        let mut prop = serde_json::Map::new();
        prop.insert("type".to_string(), json!(spec.kind.json_type()));
        if let Some(default) = &spec.default {
            prop.insert("default".to_string(), default.clone());
        } else {
            required.push(json!(name));
        }
        properties.insert(name.clone(), Value::Object(prop));
    }
    properties.insert(
        "return_directly".to_string(),
        json!({"type": "boolean", "default": true}),
    );

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Human-readable step summary, e.g. `2 API calls + 1 SQL step`.
pub fn steps_summary(api_kind: ApiKind, steps: usize, sql_steps: usize) -> String {
    let mut parts = Vec::new();
    if steps > 0 {
        let noun = match (api_kind, steps) {
            (ApiKind::Graphql, 1) => "GraphQL query",
            (ApiKind::Graphql, _) => "GraphQL queries",
            (ApiKind::Rest, 1) => "API call",
            (ApiKind::Rest, _) => "API calls",
        };
        parts.push(format!("{steps} {noun}"));
    }
    if sql_steps > 0 {
        let noun = if sql_steps == 1 { "SQL step" } else { "SQL steps" };
        parts.push(format!("{sql_steps} {noun}"));
    }
    if parts.is_empty() {
        "no steps".to_string()
    } else {
        parts.join(" + ")
    }
}

/// Description text for a recipe exposed as a callable.
pub fn recipe_description(question: &str, recipe: &Recipe, api_kind: ApiKind) -> String {
    format!(
        "Execute recipe: {question}\n\nRecipe performs: {}",
        steps_summary(api_kind, recipe.steps.len(), recipe.sql_steps.len())
    )
}

/// Qualitative hint for a match score.
pub fn score_hint(score: f64) -> &'static str {
    if score >= 0.8 {
        "STRONG MATCH - highly recommended"
    } else if score >= 0.6 {
        "Good match - verify params"
    } else {
        "Possible match - check alignment"
    }
}

fn param_signature(params: &HashMap<String, ParamSpec>) -> String {
    let ordered: BTreeMap<&String, &ParamSpec> = params.iter().collect();
    ordered
        .into_iter()
        .map(|(name, spec)| match &spec.default {
            Some(default) if !default.is_null() => {
                let shown = match default {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{name}: {} = {shown}", spec.kind)
            }
            _ => format!("{name}: {}", spec.kind),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rank recipes for a question and build a `<recipes>` context block a host
/// can embed into a prompt. Returns the suggestions alongside the block;
/// both are empty when nothing matches.
pub fn suggest_with_context(
    store: &RecipeStore,
    api_id: &str,
    schema_hash: &str,
    question: &str,
    api_kind: ApiKind,
    k: usize,
) -> (Vec<RecipeSuggestion>, String) {
    let suggestions = store.suggest(api_id, schema_hash, question, k);
    if suggestions.is_empty() {
        return (suggestions, String::new());
    }

    let mut lines = vec![
        "<recipes>".to_string(),
        "Available recipe tools (sorted by relevance):".to_string(),
    ];
    for (index, suggestion) in suggestions.iter().enumerate() {
        let Some(recipe) = store.get(&suggestion.recipe_id) else {
            continue;
        };
        let tool_name = if suggestion.tool_name.is_empty() {
            sanitize_tool_name(&suggestion.question)
        } else {
            suggestion.tool_name.clone()
        };
        lines.push(String::new());
        lines.push(format!(
            "{}. {tool_name}({})",
            index + 1,
            param_signature(&recipe.params)
        ));
        lines.push(format!("   Question: \"{}\"", suggestion.question));
        lines.push(format!(
            "   Score: {:.2} ({})",
            suggestion.score,
            score_hint(suggestion.score)
        ));
        lines.push(format!(
            "   Steps: {}",
            steps_summary(api_kind, recipe.steps.len(), recipe.sql_steps.len())
        ));
    }
    lines.push("</recipes>".to_string());

    (suggestions, lines.join("\n"))
}

/// Build descriptors for every recipe in a `(api_id, schema_hash)` bucket.
///
/// Records are grouped by their length-capped slug; within a group the most
/// recently used record wins and shadowed duplicates are noted in the
/// description. Names are deduplicated across groups with a numeric suffix.
pub fn list_tool_descriptors(
    store: &RecipeStore,
    api_id: &str,
    schema_hash: &str,
    api_kind: ApiKind,
    config: &RecipeConfig,
) -> Vec<ToolDescriptor> {
    let records = store.list(api_id, schema_hash);
    let cap = max_slug_len(config.max_tool_name_len, &config.tool_prefix);

    let mut by_slug: BTreeMap<String, Vec<RecipeRecord>> = BTreeMap::new();
    for record in records {
        let base = if record.tool_name.is_empty() {
            "recipe".to_string()
        } else {
            record.tool_name.clone()
        };
        let slug: String = sanitize_tool_name(&base).chars().take(cap).collect();
        by_slug.entry(slug).or_default().push(record);
    }

    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();
    for (slug, mut group) in by_slug {
        group.sort_by(|a, b| (b.last_used_at, b.created_at).cmp(&(a.last_used_at, a.created_at)));
        let record = &group[0];

        let mut description = recipe_description(&record.question, &record.recipe, api_kind);
        description.push_str(&format!("\nRecipe Name: {}", record.tool_name));
        if group.len() > 1 {
            description.push_str(&format!(
                "\nNote: {} recipes share this name; using most recent.",
                group.len()
            ));
        }

        let name = exposed_tool_name(&slug, config.max_tool_name_len, &config.tool_prefix);
        descriptors.push(ToolDescriptor {
            name: dedup_name(&name, &mut seen),
            description: Some(description),
            input_schema: build_input_schema(&record.recipe.params),
        });
    }
    descriptors
}
