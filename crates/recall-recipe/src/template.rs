//! Template rendering for recipe steps.
//!
//! Two independent substitution grammars, each with an inverse used by the
//! validator:
//!
//! - **Free text**: `{{name}}` placeholders inside GraphQL query and SQL
//!   templates, replaced with a type-aware scalar form.
//! - **Structured references**: `{"$param": "name"}` nodes inside REST
//!   path/query/body objects, replaced wholesale by the parameter value.
//!
//! Rendering never defaults a missing parameter: defaults are resolved
//! earlier, when the effective parameter map is built with
//! [`params_with_defaults`].

use recall_core::ParamSpec;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

/// Effective parameter values, keyed by name.
pub type ParamMap = HashMap<String, Value>;

/// `{{name}}` placeholder: identifier starting with a letter or underscore.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}").expect("placeholder regex"));

/// A template referenced a parameter absent from the effective map.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing param: {name}")]
    MissingParam { name: String },
}

/// Whitespace-normalize text for template equivalence checks: consecutive
/// whitespace collapses to a single space, leading/trailing is trimmed.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Type-aware scalar form used for text substitution. The template carries
/// any quoting, so strings are inserted bare.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render `{{name}}` placeholders in a free-text template.
pub fn render_text(template: &str, params: &ParamMap) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = params
            .get(name.as_str())
            .ok_or_else(|| RenderError::MissingParam {
                name: name.as_str().to_string(),
            })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&scalar_text(value));
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Recursively replace `{"$param": "name"}` nodes with `params["name"]`.
///
/// Only a map consisting of exactly the `$param` key with a string value is
/// a reference; every other map or sequence is walked, and scalars pass
/// through unchanged.
pub fn render_refs(node: &Value, params: &ParamMap) -> Result<Value, RenderError> {
    match node {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(name)) = map.get("$param") {
                    return params
                        .get(name)
                        .cloned()
                        .ok_or_else(|| RenderError::MissingParam { name: name.clone() });
                }
            }
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), render_refs(value, params)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_refs(item, params))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}

/// Build the effective parameter map: every declared default, overlaid with
/// caller-provided values. Parameters without a default contribute nothing
/// here; requiredness is enforced by the caller.
pub fn params_with_defaults(
    spec: &HashMap<String, ParamSpec>,
    provided: &ParamMap,
) -> ParamMap {
    let mut out = ParamMap::new();
    for (name, param) in spec {
        if let Some(default) = &param.default {
            out.insert(name.clone(), default.clone());
        }
    }
    for (name, value) in provided {
        out.insert(name.clone(), value.clone());
    }
    out
}

/// Collect `{{name}}` placeholder names from a free-text template.
pub fn placeholder_names(template: &str, found: &mut HashSet<String>) {
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            found.insert(name.as_str().to_string());
        }
    }
}

/// Collect `{"$param": "name"}` reference names from a structured node.
pub fn ref_names(node: &Value, found: &mut HashSet<String>) {
    match node {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(name)) = map.get("$param") {
                    found.insert(name.clone());
                    return;
                }
            }
            for value in map.values() {
                ref_names(value, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                ref_names(item, found);
            }
        }
        _ => {}
    }
}

/// Normalize an absent structured value to the empty object, so a step that
/// omitted a field entirely and one that passed `{}` compare equal.
pub fn canon_obj(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::ParamType;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn render_text_substitutes_scalars() {
        let p = params(&[("n", json!(10))]);
        assert_eq!(render_text("limit {{n}}", &p).unwrap(), "limit 10");

        let p = params(&[("flag", json!(true))]);
        assert_eq!(render_text("active={{flag}}", &p).unwrap(), "active=true");

        let p = params(&[("x", Value::Null)]);
        assert_eq!(render_text("v={{x}}", &p).unwrap(), "v=null");
    }

    #[test]
    fn render_text_inserts_strings_bare() {
        let p = params(&[("q", json!("alice"))]);
        assert_eq!(
            render_text("name ILIKE '{{q}}%'", &p).unwrap(),
            "name ILIKE 'alice%'"
        );
    }

    #[test]
    fn render_text_repeats_occurrences() {
        let p = params(&[("id", json!(7))]);
        assert_eq!(render_text("{{id}}-{{id}}", &p).unwrap(), "7-7");
    }

    #[test]
    fn render_text_fails_on_missing_param() {
        let err = render_text("limit {{n}}", &ParamMap::new()).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingParam {
                name: "n".to_string()
            }
        );
    }

    #[test]
    fn render_refs_replaces_nested_nodes() {
        let node = json!({"a": {"$param": "x"}, "b": [{"$param": "y"}], "c": 3});
        let p = params(&[("x", json!(1)), ("y", json!("foo"))]);
        let out = render_refs(&node, &p).unwrap();
        assert_eq!(out, json!({"a": 1, "b": ["foo"], "c": 3}));
    }

    #[test]
    fn render_refs_only_matches_exact_ref_shape() {
        // Extra keys mean an ordinary object, not a reference.
        let node = json!({"$param": "x", "other": 1});
        let out = render_refs(&node, &ParamMap::new()).unwrap();
        assert_eq!(out, node);

        // A non-string value is not a reference either.
        let node = json!({"$param": 3});
        let out = render_refs(&node, &ParamMap::new()).unwrap();
        assert_eq!(out, node);
    }

    #[test]
    fn render_refs_fails_on_missing_param() {
        let node = json!({"limit": {"$param": "limit"}});
        let err = render_refs(&node, &ParamMap::new()).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingParam {
                name: "limit".to_string()
            }
        );
    }

    #[test]
    fn params_with_defaults_overlays_provided() {
        let mut spec = HashMap::new();
        spec.insert(
            "limit".to_string(),
            ParamSpec {
                kind: ParamType::Int,
                default: Some(json!(10)),
            },
        );
        spec.insert(
            "q".to_string(),
            ParamSpec {
                kind: ParamType::Str,
                default: None,
            },
        );

        let effective = params_with_defaults(&spec, &params(&[("q", json!("abc"))]));
        assert_eq!(effective, params(&[("limit", json!(10)), ("q", json!("abc"))]));
    }

    #[test]
    fn params_with_defaults_keeps_null_defaults() {
        let mut spec = HashMap::new();
        spec.insert(
            "id".to_string(),
            ParamSpec {
                kind: ParamType::Int,
                default: Some(Value::Null),
            },
        );

        let effective = params_with_defaults(&spec, &ParamMap::new());
        assert_eq!(effective, params(&[("id", Value::Null)]));

        // A provided value overrides the null default.
        let effective = params_with_defaults(&spec, &params(&[("id", json!(42))]));
        assert_eq!(effective, params(&[("id", json!(42))]));
    }

    #[test]
    fn normalize_ws_collapses_and_trims() {
        assert_eq!(normalize_ws("  a \n\t b  "), "a b");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn placeholder_and_ref_collection() {
        let mut found = HashSet::new();
        placeholder_names("WHERE a = {{x}} AND b = {{y}}", &mut found);
        assert_eq!(found.len(), 2);
        assert!(found.contains("x") && found.contains("y"));

        let mut found = HashSet::new();
        ref_names(
            &json!({"a": {"$param": "p"}, "b": [{"c": {"$param": "q"}}]}),
            &mut found,
        );
        assert!(found.contains("p") && found.contains("q"));
    }

    #[test]
    fn canon_obj_maps_null_to_empty_object() {
        assert_eq!(canon_obj(&Value::Null), json!({}));
        assert_eq!(canon_obj(&json!({"a": 1})), json!({"a": 1}));
    }
}
