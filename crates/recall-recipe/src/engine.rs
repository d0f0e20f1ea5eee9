//! Recipe execution engine.
//!
//! Replays a stored recipe's steps against live parameter values in two
//! phases: every API step in order through an injected [`StepExecutor`]
//! (the same engine drives GraphQL and REST without knowing transport
//! details), then every SQL step in order through a [`TabularQueryEngine`]
//! over the accumulated named result sets.
//!
//! The first failure at either phase aborts the remaining pipeline; already
//! executed steps are reported, not rolled back — there is no transaction
//! guarantee across external calls. Steps run strictly sequentially, since
//! later steps may read earlier steps' output tables.

use crate::context::{RequestScope, ResultSets};
use crate::template::{render_text, ParamMap};
use async_trait::async_trait;
use recall_core::{Recipe, RecipeStep};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Failure of a single API or query step during replay.
#[derive(Debug, Clone)]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StepError {}

/// Output of one successful API step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Rows extracted for the step's output table, if the response was
    /// tabular.
    pub data: Option<Vec<Value>>,
    /// Call record for reporting back to the caller.
    pub record: Option<Value>,
}

/// Executes one API step: renders the step's templates, performs the live
/// call, and merges returned tables into the request scope under the step's
/// output name.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        index: usize,
        step: &RecipeStep,
        params: &ParamMap,
        scope: &RequestScope,
    ) -> Result<StepOutput, StepError>;
}

/// Result of one tabular query over named in-memory result sets.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub success: bool,
    pub result: Vec<Value>,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn ok(result: Vec<Value>) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Runs a SQL-like query over named in-memory tables already produced by
/// prior API steps. Ordinary failures are reported via `success = false`,
/// never panics or exceptions.
pub trait TabularQueryEngine: Send + Sync {
    fn run(&self, tables: &ResultSets, query: &str) -> QueryOutcome;
}

/// Report of one recipe replay.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RecipeRun {
    pub success: bool,
    /// Rows from the last step that produced any (API or SQL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_data: Option<Vec<Value>>,
    /// Records of the API calls that completed.
    pub executed: Vec<Value>,
    /// SQL statements attempted, in order, rendered.
    pub executed_sql: Vec<String>,
    /// Error of the first failed step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecipeRun {
    fn failed(self, message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            ..self
        }
    }
}

/// Replay a recipe's steps with bound parameter values.
///
/// The API phase runs first; only if it fully succeeds does the query phase
/// start. Each successful SQL step overwrites the scope's "last result"
/// slot, so later steps in the same recipe (and the final report) see the
/// freshly computed table.
pub async fn execute_steps(
    recipe: &Recipe,
    params: &ParamMap,
    scope: &RequestScope,
    executor: &dyn StepExecutor,
    query_engine: &dyn TabularQueryEngine,
) -> RecipeRun {
    let mut run = RecipeRun::default();

    for (index, step) in recipe.steps.iter().enumerate() {
        match executor.execute(index, step, params, scope).await {
            Ok(output) => {
                if let Some(record) = output.record {
                    run.executed.push(record);
                }
                if let Some(rows) = output.data {
                    scope.set_last_result(rows);
                }
            }
            Err(err) => {
                tracing::debug!(step = index, error = %err, "recipe API step failed");
                return run.failed(err.message);
            }
        }
    }

    for (index, template) in recipe.sql_steps.iter().enumerate() {
        let sql = match render_text(template, params) {
            Ok(sql) => sql,
            Err(err) => {
                tracing::debug!(step = index, error = %err, "recipe query step failed to render");
                return run.failed(err.to_string());
            }
        };

        let outcome = scope.with_tables(|tables| query_engine.run(tables, &sql));
        run.executed_sql.push(sql);
        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "query failed".to_string());
            tracing::debug!(step = index, error = %message, "recipe query step failed");
            return run.failed(message);
        }
        scope.set_last_result(outcome.result);
    }

    run.success = true;
    run.last_data = scope.last_result();
    run
}
