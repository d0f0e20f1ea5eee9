//! Candidate recipe validation.
//!
//! A candidate recipe is untrusted input: it comes from a generative
//! extraction process and must be proven behaviorally equivalent to the
//! execution trace it claims to summarize before it is ever stored. Three
//! checks run, in order:
//!
//! 1. **Structure** — the chosen tool name is a valid callable identifier.
//! 2. **Parameter usage** — declared parameters and template references must
//!    agree: unreferenced declarations are pruned, undeclared references are
//!    fatal, and a candidate that declares parameters but references none
//!    failed to parameterize at all.
//! 3. **Equivalence** — re-rendering every template with the recipe's own
//!    defaults must reproduce the original execution exactly (whitespace
//!    normalized for text, value equality for structured fields).
//!
//! Any failure discards the whole candidate; no partial acceptance.

use crate::naming::is_valid_tool_name;
use crate::template::{
    canon_obj, normalize_ws, params_with_defaults, placeholder_names, ref_names, render_refs,
    render_text, ParamMap, RenderError,
};
use recall_core::{ApiKind, ExecutedCall, Recipe, RecipeStep};
use std::collections::HashSet;
use std::fmt;

// =============================================================================
// VALIDATION ERROR TYPES
// =============================================================================

/// Error type for validation failures.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The kind of validation error.
    pub kind: ValidationErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn tool_name_invalid(name: &str) -> Self {
        Self::new(
            ValidationErrorKind::ToolNameInvalid,
            format!("tool name '{name}' is not a valid callable identifier"),
        )
    }

    pub fn params_unused() -> Self {
        Self::new(
            ValidationErrorKind::ParamsUnused,
            "parameters are declared but none is referenced by any template",
        )
    }

    pub fn undeclared_param(name: &str) -> Self {
        Self::new(
            ValidationErrorKind::UndeclaredParam,
            format!("template references undeclared parameter '{name}'"),
        )
    }

    pub fn step_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            ValidationErrorKind::StepCountMismatch,
            format!("expected {expected} API steps, recipe has {actual}"),
        )
    }

    pub fn sql_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            ValidationErrorKind::SqlCountMismatch,
            format!("expected {expected} query steps, recipe has {actual}"),
        )
    }

    pub fn step_kind_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::StepKindMismatch,
            format!("step {index} kind differs from the original call"),
        )
    }

    pub fn output_name_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::OutputNameMismatch,
            format!("step {index} output name differs from the original call"),
        )
    }

    pub fn method_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::MethodMismatch,
            format!("step {index} HTTP method differs from the original call"),
        )
    }

    pub fn path_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::PathMismatch,
            format!("step {index} path differs from the original call"),
        )
    }

    pub fn rendered_query_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::RenderedQueryMismatch,
            format!("step {index} query template does not render to the original query"),
        )
    }

    pub fn rendered_object_mismatch(index: usize, field: &str) -> Self {
        Self::new(
            ValidationErrorKind::RenderedObjectMismatch,
            format!("step {index} {field} does not render to the original value"),
        )
    }

    pub fn rendered_sql_mismatch(index: usize) -> Self {
        Self::new(
            ValidationErrorKind::RenderedSqlMismatch,
            format!("query step {index} does not render to the original query"),
        )
    }
}

impl From<RenderError> for ValidationError {
    fn from(err: RenderError) -> Self {
        let RenderError::MissingParam { name } = err;
        Self::new(
            ValidationErrorKind::MissingParam,
            format!("template references parameter '{name}' with no default"),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    // Structure errors
    /// Tool name is not a valid lowercase-start identifier.
    ToolNameInvalid,

    // Parameter consistency errors
    /// Parameters declared but none referenced anywhere.
    ParamsUnused,
    /// A template references a parameter that is not declared.
    UndeclaredParam,
    /// Rendering hit a parameter with no default.
    MissingParam,

    // Equivalence errors
    /// API step counts differ.
    StepCountMismatch,
    /// Query step counts differ.
    SqlCountMismatch,
    /// A step's kind differs from the original call.
    StepKindMismatch,
    /// A step's output name differs.
    OutputNameMismatch,
    /// A REST step's HTTP method differs.
    MethodMismatch,
    /// A REST step's path differs.
    PathMismatch,
    /// A rendered GraphQL query differs from the original.
    RenderedQueryMismatch,
    /// A rendered REST structured field differs from the original.
    RenderedObjectMismatch,
    /// A rendered SQL step differs from the original.
    RenderedSqlMismatch,
}

// =============================================================================
// PARAMETER USAGE
// =============================================================================

/// Collect the set of parameter names actually referenced across every
/// template in the recipe.
fn used_params(recipe: &Recipe, api_kind: ApiKind) -> HashSet<String> {
    let mut used = HashSet::new();

    for sql in &recipe.sql_steps {
        placeholder_names(sql, &mut used);
    }

    for step in &recipe.steps {
        match (api_kind, step) {
            (ApiKind::Graphql, RecipeStep::Graphql { query_template, .. }) => {
                placeholder_names(query_template, &mut used);
            }
            (
                ApiKind::Rest,
                RecipeStep::Rest {
                    path_params,
                    query_params,
                    body,
                    ..
                },
            ) => {
                ref_names(path_params, &mut used);
                ref_names(query_params, &mut used);
                ref_names(body, &mut used);
            }
            _ => {}
        }
    }

    used
}

/// Enforce parameter-usage consistency, pruning harmless orphans.
///
/// - Declared parameters with zero references anywhere: the generator failed
///   to parameterize — reject.
/// - References to undeclared parameters: would fail to render later —
///   reject.
/// - Declared-but-unreferenced names (when others are referenced): silently
///   dropped so they never appear in the generated calling interface.
pub fn check_param_usage(recipe: &mut Recipe, api_kind: ApiKind) -> Result<(), ValidationError> {
    let declared: HashSet<String> = recipe.params.keys().cloned().collect();
    let used = used_params(recipe, api_kind);

    if !declared.is_empty() && used.is_empty() {
        return Err(ValidationError::params_unused());
    }
    if let Some(name) = used.difference(&declared).next() {
        return Err(ValidationError::undeclared_param(name));
    }
    if declared != used {
        recipe.params.retain(|name, _| used.contains(name));
        tracing::debug!(
            pruned = declared.len() - recipe.params.len(),
            "dropped unreferenced recipe parameters"
        );
    }
    Ok(())
}

// =============================================================================
// STRUCTURE
// =============================================================================

/// Validate the candidate's callable identifier.
pub fn validate_structure(recipe: &Recipe) -> Result<(), ValidationError> {
    if !is_valid_tool_name(&recipe.tool_name) {
        return Err(ValidationError::tool_name_invalid(&recipe.tool_name));
    }
    Ok(())
}

// =============================================================================
// EQUIVALENCE
// =============================================================================

fn check_graphql_step(
    index: usize,
    original: &ExecutedCall,
    step: &RecipeStep,
    params: &ParamMap,
) -> Result<(), ValidationError> {
    let ExecutedCall::Graphql { name, query } = original else {
        return Err(ValidationError::step_kind_mismatch(index));
    };
    let RecipeStep::Graphql {
        name: step_name,
        query_template,
    } = step
    else {
        return Err(ValidationError::step_kind_mismatch(index));
    };

    if step_name != name {
        return Err(ValidationError::output_name_mismatch(index));
    }
    let rendered = render_text(query_template, params)?;
    if normalize_ws(&rendered) != normalize_ws(query) {
        return Err(ValidationError::rendered_query_mismatch(index));
    }
    Ok(())
}

fn check_rest_step(
    index: usize,
    original: &ExecutedCall,
    step: &RecipeStep,
    params: &ParamMap,
) -> Result<(), ValidationError> {
    let ExecutedCall::Rest {
        name,
        method,
        path,
        path_params,
        query_params,
        body,
    } = original
    else {
        return Err(ValidationError::step_kind_mismatch(index));
    };
    let RecipeStep::Rest {
        name: step_name,
        method: step_method,
        path: step_path,
        path_params: step_path_params,
        query_params: step_query_params,
        body: step_body,
    } = step
    else {
        return Err(ValidationError::step_kind_mismatch(index));
    };

    if step_name != name {
        return Err(ValidationError::output_name_mismatch(index));
    }
    if !step_method.eq_ignore_ascii_case(method) {
        return Err(ValidationError::method_mismatch(index));
    }
    if step_path != path {
        return Err(ValidationError::path_mismatch(index));
    }

    for (field, templated, original_value) in [
        ("path_params", step_path_params, path_params),
        ("query_params", step_query_params, query_params),
        ("body", step_body, body),
    ] {
        let rendered = render_refs(&canon_obj(templated), params)?;
        if rendered != canon_obj(original_value) {
            return Err(ValidationError::rendered_object_mismatch(index, field));
        }
    }
    Ok(())
}

/// Prove the candidate re-renders to the original execution using only its
/// own declared defaults.
///
/// Equivalence is defined only for recipes whose step count and kind
/// sequence match the trace exactly; text is compared whitespace-normalized,
/// structured fields by value equality with absent fields normalized to the
/// empty object. This is a per-example proof for the declared defaults, not
/// a proof over all parameter values.
pub fn validate_equivalence(
    api_kind: ApiKind,
    original_steps: &[ExecutedCall],
    original_sql: &[String],
    recipe: &Recipe,
) -> Result<(), ValidationError> {
    // Only ever runs against the recipe's own defaults; parameters without a
    // default are simply absent here and any reference to one is an error.
    let params = params_with_defaults(&recipe.params, &ParamMap::new());

    if recipe.steps.len() != original_steps.len() {
        return Err(ValidationError::step_count_mismatch(
            original_steps.len(),
            recipe.steps.len(),
        ));
    }
    if recipe.sql_steps.len() != original_sql.len() {
        return Err(ValidationError::sql_count_mismatch(
            original_sql.len(),
            recipe.sql_steps.len(),
        ));
    }

    for (index, (original, step)) in original_steps.iter().zip(&recipe.steps).enumerate() {
        if step.kind() != original.kind() {
            return Err(ValidationError::step_kind_mismatch(index));
        }
        match api_kind {
            ApiKind::Graphql => check_graphql_step(index, original, step, &params)?,
            ApiKind::Rest => check_rest_step(index, original, step, &params)?,
        }
    }

    for (index, (original, template)) in original_sql.iter().zip(&recipe.sql_steps).enumerate() {
        let rendered = render_text(template, &params)?;
        if normalize_ws(&rendered) != normalize_ws(original) {
            return Err(ValidationError::rendered_sql_mismatch(index));
        }
    }

    Ok(())
}
