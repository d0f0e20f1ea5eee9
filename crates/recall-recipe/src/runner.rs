//! Replaying stored recipes against a live target.
//!
//! [`RecipeRunner`] is the generic invoker: given `(recipe_id, parameter
//! map)` it resolves the record, proves the live target still matches the
//! identity the recipe was created under (fail closed on schema drift),
//! validates the caller's parameters against the declared spec, and drives
//! the execution engine with a transport-appropriate step executor built on
//! the injected [`ApiExecutor`].

use crate::context::{RequestScope, ResultSets};
use crate::csv::rows_to_csv;
use crate::engine::{
    execute_steps, RecipeRun, StepError, StepExecutor, StepOutput, TabularQueryEngine,
};
use crate::error::RecipeError;
use crate::store::{build_api_id, sha256_hex, RecipeStore};
use crate::template::{canon_obj, params_with_defaults, render_refs, render_text, ParamMap};
use async_trait::async_trait;
use recall_core::{ApiKind, Recipe, RecipeConfig, RecipeStep};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of the live target a replay runs against.
#[derive(Debug, Clone)]
pub struct ApiTarget {
    pub kind: ApiKind,
    /// GraphQL endpoint or OpenAPI document URL.
    pub target_url: String,
    /// Explicit base URL override for REST calls; empty to use the one the
    /// schema fetcher resolves.
    pub base_url: String,
    /// Headers forwarded to the target on every call.
    pub headers: HashMap<String, String>,
}

/// One live API call, fully rendered.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiCall {
    Graphql {
        query: String,
    },
    Rest {
        method: String,
        path: String,
        path_params: Value,
        query_params: Value,
        body: Value,
    },
}

/// Result of one live API call. Ordinary failures (auth errors, 4xx/5xx)
/// are reported via `success = false`, never raised.
#[derive(Debug, Clone, Default)]
pub struct ApiOutcome {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ApiOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(message.into()),
        }
    }
}

/// Executes a single rendered API call against the live target.
#[async_trait]
pub trait ApiExecutor: Send + Sync {
    async fn execute(&self, call: ApiCall, headers: &HashMap<String, String>) -> ApiOutcome;
}

/// A fetched schema for the live target. `raw` is the complete
/// machine-parseable serialization used for fingerprinting; it is empty on
/// failure — fetching never raises into the core.
#[derive(Debug, Clone, Default)]
pub struct FetchedSchema {
    pub compact: String,
    pub base_url: String,
    pub raw: String,
}

/// Loads the target's schema.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, target_url: &str, headers: &HashMap<String, String>) -> FetchedSchema;
}

/// Output of a successful replay.
#[derive(Debug, Clone)]
pub enum RecipeOutput {
    /// The final row set rendered as CSV.
    Table(String),
    /// Structured report: executed call records, executed SQL, and a capped
    /// preview of the final rows.
    Report(Value),
}

/// Turn API response data into named tables for the request scope.
///
/// A list response is one table under the step's output name. An object
/// response with exactly one top-level array field contributes that array
/// under the output name; with several array fields each lands under
/// `<name>_<field>`; with none, the object itself becomes a single-row
/// table.
pub fn tables_from_response(data: &Value, name: &str) -> ResultSets {
    fn rows_of(items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .map(|item| {
                if item.is_object() {
                    item.clone()
                } else {
                    json!({"value": item})
                }
            })
            .collect()
    }

    let mut tables = ResultSets::new();
    match data {
        Value::Array(items) => {
            tables.insert(name.to_string(), rows_of(items));
        }
        Value::Object(map) => {
            let arrays: Vec<(&String, &Vec<Value>)> = map
                .iter()
                .filter_map(|(key, value)| value.as_array().map(|items| (key, items)))
                .collect();
            match arrays.as_slice() {
                [] => {
                    tables.insert(name.to_string(), vec![data.clone()]);
                }
                [(_, items)] => {
                    tables.insert(name.to_string(), rows_of(items));
                }
                many => {
                    for (key, items) in many {
                        tables.insert(format!("{name}_{key}"), rows_of(items));
                    }
                }
            }
        }
        _ => {}
    }
    tables
}

struct GraphqlStepExecutor {
    api: Arc<dyn ApiExecutor>,
    headers: HashMap<String, String>,
}

#[async_trait]
impl StepExecutor for GraphqlStepExecutor {
    async fn execute(
        &self,
        _index: usize,
        step: &RecipeStep,
        params: &ParamMap,
        scope: &RequestScope,
    ) -> Result<StepOutput, StepError> {
        let RecipeStep::Graphql {
            name,
            query_template,
        } = step
        else {
            return Err(StepError::new("invalid recipe step"));
        };

        let query = render_text(query_template, params).map_err(|e| StepError::new(e.to_string()))?;
        let outcome = self
            .api
            .execute(ApiCall::Graphql { query: query.clone() }, &self.headers)
            .await;
        if !outcome.success {
            return Err(StepError::new(
                outcome.error.unwrap_or_else(|| "query failed".to_string()),
            ));
        }

        let tables = tables_from_response(&outcome.data, name);
        let data = tables.get(name.as_str()).cloned();
        scope.merge_tables(tables);
        Ok(StepOutput {
            data,
            record: Some(json!(query)),
        })
    }
}

struct RestStepExecutor {
    api: Arc<dyn ApiExecutor>,
    headers: HashMap<String, String>,
}

#[async_trait]
impl StepExecutor for RestStepExecutor {
    async fn execute(
        &self,
        _index: usize,
        step: &RecipeStep,
        params: &ParamMap,
        scope: &RequestScope,
    ) -> Result<StepOutput, StepError> {
        let RecipeStep::Rest {
            name,
            method,
            path,
            path_params,
            query_params,
            body,
        } = step
        else {
            return Err(StepError::new("invalid recipe step"));
        };

        let render = |value: &Value| -> Result<Value, StepError> {
            render_refs(&canon_obj(value), params).map_err(|e| StepError::new(e.to_string()))
        };
        let path_params = render(path_params)?;
        let query_params = render(query_params)?;
        let rendered_body = render(body)?;
        // An empty body object means "no body" on the wire.
        let body = match &rendered_body {
            Value::Object(map) if map.is_empty() => Value::Null,
            other => other.clone(),
        };

        let method = method.to_uppercase();
        let outcome = self
            .api
            .execute(
                ApiCall::Rest {
                    method: method.clone(),
                    path: path.clone(),
                    path_params: path_params.clone(),
                    query_params: query_params.clone(),
                    body: body.clone(),
                },
                &self.headers,
            )
            .await;
        if !outcome.success {
            return Err(StepError::new(
                outcome
                    .error
                    .unwrap_or_else(|| "request failed".to_string()),
            ));
        }

        let tables = tables_from_response(&outcome.data, name);
        let data = tables.get(name.as_str()).cloned();
        scope.merge_tables(tables);

        let compact = |value: &Value| -> String {
            if value.is_null() {
                String::new()
            } else {
                value.to_string()
            }
        };
        Ok(StepOutput {
            data,
            record: Some(json!({
                "method": method,
                "path": path,
                "path_params": compact(&path_params),
                "query_params": compact(&query_params),
                "body": compact(&body),
                "name": name,
                "success": true,
            })),
        })
    }
}

/// Generic recipe invoker over injected collaborators.
pub struct RecipeRunner {
    store: Arc<RecipeStore>,
    schema: Arc<dyn SchemaFetcher>,
    api: Arc<dyn ApiExecutor>,
    query_engine: Arc<dyn TabularQueryEngine>,
    config: RecipeConfig,
}

impl RecipeRunner {
    pub fn new(
        store: Arc<RecipeStore>,
        schema: Arc<dyn SchemaFetcher>,
        api: Arc<dyn ApiExecutor>,
        query_engine: Arc<dyn TabularQueryEngine>,
        config: RecipeConfig,
    ) -> Self {
        Self {
            store,
            schema,
            api,
            query_engine,
            config,
        }
    }

    /// Replay a recipe by id against a live target.
    ///
    /// `scope` carries the request-local result sets; it is reset before the
    /// first step runs. `return_directly` selects CSV output over the
    /// structured report.
    pub async fn run(
        &self,
        target: &ApiTarget,
        recipe_id: &str,
        provided: &ParamMap,
        return_directly: bool,
        scope: &RequestScope,
    ) -> Result<RecipeOutput, RecipeError> {
        let fetched = self.schema.fetch(&target.target_url, &target.headers).await;
        if fetched.raw.is_empty() {
            return Err(RecipeError::SchemaUnavailable);
        }
        let base_url = if target.base_url.is_empty() {
            fetched.base_url.clone()
        } else {
            target.base_url.clone()
        };

        let meta = self
            .store
            .get_meta(recipe_id)
            .ok_or_else(|| RecipeError::NotFound {
                recipe_id: recipe_id.to_string(),
            })?;

        let schema_hash = sha256_hex(&fetched.raw);
        let api_id = build_api_id(target.kind, &target.target_url, &base_url);
        if meta.schema_hash != schema_hash || meta.api_id != api_id {
            tracing::debug!(recipe_id, "refusing replay against drifted API or schema");
            return Err(RecipeError::IdentityMismatch);
        }

        let params = validate_params(&meta.recipe, provided)?;

        scope.reset();
        let executor: Box<dyn StepExecutor> = match target.kind {
            ApiKind::Graphql => Box::new(GraphqlStepExecutor {
                api: self.api.clone(),
                headers: target.headers.clone(),
            }),
            ApiKind::Rest => Box::new(RestStepExecutor {
                api: self.api.clone(),
                headers: target.headers.clone(),
            }),
        };

        let run = execute_steps(
            &meta.recipe,
            &params,
            scope,
            executor.as_ref(),
            self.query_engine.as_ref(),
        )
        .await;
        if !run.success {
            let message = run.error.clone().unwrap_or_else(|| "step failed".to_string());
            return Err(RecipeError::StepFailed { message, run });
        }

        if return_directly {
            let rows = run.last_data.unwrap_or_default();
            return Ok(RecipeOutput::Table(rows_to_csv(&rows)));
        }
        Ok(RecipeOutput::Report(self.report(target.kind, run)))
    }

    fn report(&self, api_kind: ApiKind, run: RecipeRun) -> Value {
        let item_key = match api_kind {
            ApiKind::Graphql => "executed_queries",
            ApiKind::Rest => "executed_calls",
        };
        let mut report = json!({
            "success": true,
            item_key: run.executed,
            "executed_sql": run.executed_sql,
        });
        if let Some(rows) = run.last_data {
            let preview: Vec<Value> = rows.iter().take(self.config.preview_rows).cloned().collect();
            report["row_count"] = json!(rows.len());
            report["result"] = json!(preview);
            if rows.len() > self.config.preview_rows {
                report["truncated"] = json!(true);
            }
        }
        report
    }
}

/// Check caller-provided parameters against the declared spec and build the
/// effective map.
fn validate_params(recipe: &Recipe, provided: &ParamMap) -> Result<ParamMap, RecipeError> {
    let mut unexpected: Vec<&str> = provided
        .keys()
        .filter(|name| !recipe.params.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(RecipeError::InvalidParams(format!(
            "unexpected params: {}",
            unexpected.join(", ")
        )));
    }

    for (name, spec) in &recipe.params {
        match provided.get(name) {
            Some(value) => {
                if !spec.kind.accepts(value) {
                    return Err(RecipeError::InvalidParams(format!(
                        "invalid value for param {name}: expected {}",
                        spec.kind
                    )));
                }
            }
            None => {
                if spec.is_required() {
                    return Err(RecipeError::InvalidParams(format!(
                        "missing required param: {name}"
                    )));
                }
            }
        }
    }

    Ok(params_with_defaults(&recipe.params, provided))
}
