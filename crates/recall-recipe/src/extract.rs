//! Extraction orchestration: from a successful execution trace to a stored,
//! validated recipe.
//!
//! The extractor itself is an opaque external collaborator (typically a
//! generative process); whatever it returns is untrusted input. A candidate
//! only reaches the store after passing structure, parameter-usage, and
//! equivalence validation. Extraction is best-effort: any failure is logged
//! and swallowed so it can never disturb the caller's already-successful
//! primary response.

use crate::store::{sha256_hex, RecipeStore};
use crate::validator::{
    check_param_usage, validate_equivalence, validate_structure, ValidationError,
};
use async_trait::async_trait;
use recall_core::{ApiKind, ExecutedCall, Recipe, RecipeConfig};
use std::sync::Arc;

/// External recipe extractor. May be backed by a generative process; its
/// output is validated in full before persistence.
#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    /// Produce a parameterized recipe candidate from an execution trace, or
    /// `None` when no useful template can be extracted.
    async fn extract(
        &self,
        api_kind: ApiKind,
        question: &str,
        steps: &[ExecutedCall],
        sql_steps: &[String],
    ) -> anyhow::Result<Option<Recipe>>;
}

/// Decides whether to attempt extraction after a successful execution, runs
/// the external extractor, validates its output, and persists the result.
pub struct ExtractionManager {
    store: Arc<RecipeStore>,
    extractor: Arc<dyn RecipeExtractor>,
    config: RecipeConfig,
}

impl ExtractionManager {
    pub fn new(
        store: Arc<RecipeStore>,
        extractor: Arc<dyn RecipeExtractor>,
        config: RecipeConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Extract and save a recipe when the guards allow it.
    ///
    /// Skips without error when the feature is disabled, the caller flagged
    /// the trace as unrepresentable (`skip`, e.g. a polling call pattern),
    /// the trace is empty, or no schema is available to fingerprint. Returns
    /// the new recipe id when one was saved, purely for observability.
    pub async fn maybe_extract_and_save(
        &self,
        api_kind: ApiKind,
        api_id: &str,
        question: &str,
        steps: &[ExecutedCall],
        sql_steps: &[String],
        raw_schema: &str,
        skip: bool,
    ) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        if skip {
            tracing::debug!("skipping recipe extraction (caller skip condition)");
            return None;
        }
        if steps.is_empty() || raw_schema.is_empty() {
            return None;
        }

        let schema_hash = sha256_hex(raw_schema);
        let candidate = match self
            .extractor
            .extract(api_kind, question, steps, sql_steps)
            .await
        {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                tracing::debug!("extractor produced no candidate");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "recipe extraction failed");
                return None;
            }
        };

        match validate_candidate(api_kind, steps, sql_steps, candidate) {
            Ok(recipe) => {
                let recipe_id = self.store.save(api_id, &schema_hash, question, recipe);
                Some(recipe_id)
            }
            Err(err) => {
                tracing::info!(error = %err, "discarding candidate recipe");
                None
            }
        }
    }
}

/// Run the full validation sequence over an untrusted candidate. Applies to
/// every producer — generative, rule-based, or human-authored — with no
/// bypass.
fn validate_candidate(
    api_kind: ApiKind,
    steps: &[ExecutedCall],
    sql_steps: &[String],
    mut candidate: Recipe,
) -> Result<Recipe, ValidationError> {
    validate_structure(&candidate)?;
    check_param_usage(&mut candidate, api_kind)?;
    validate_equivalence(api_kind, steps, sql_steps, &candidate)?;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidationErrorKind;
    use recall_core::{ParamSpec, ParamType, RecipeStep};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedExtractor {
        candidate: Option<Recipe>,
        calls: AtomicUsize,
    }

    impl FixedExtractor {
        fn new(candidate: Option<Recipe>) -> Self {
            Self {
                candidate,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecipeExtractor for FixedExtractor {
        async fn extract(
            &self,
            _api_kind: ApiKind,
            _question: &str,
            _steps: &[ExecutedCall],
            _sql_steps: &[String],
        ) -> anyhow::Result<Option<Recipe>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidate.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl RecipeExtractor for FailingExtractor {
        async fn extract(
            &self,
            _api_kind: ApiKind,
            _question: &str,
            _steps: &[ExecutedCall],
            _sql_steps: &[String],
        ) -> anyhow::Result<Option<Recipe>> {
            anyhow::bail!("model unavailable")
        }
    }

    fn trace() -> Vec<ExecutedCall> {
        vec![ExecutedCall::Rest {
            name: "users".to_string(),
            method: "GET".to_string(),
            path: "/users".to_string(),
            path_params: json!({}),
            query_params: json!({"limit": 10}),
            body: serde_json::Value::Null,
        }]
    }

    fn good_candidate() -> Recipe {
        let mut params = HashMap::new();
        params.insert(
            "limit".to_string(),
            ParamSpec {
                kind: ParamType::Int,
                default: Some(json!(10)),
            },
        );
        Recipe {
            tool_name: "list_users".to_string(),
            params,
            steps: vec![RecipeStep::Rest {
                name: "users".to_string(),
                method: "GET".to_string(),
                path: "/users".to_string(),
                path_params: json!({}),
                query_params: json!({"limit": {"$param": "limit"}}),
                body: serde_json::Value::Null,
            }],
            sql_steps: vec![],
        }
    }

    fn manager(extractor: Arc<dyn RecipeExtractor>, enabled: bool) -> ExtractionManager {
        let config = RecipeConfig {
            enabled,
            ..RecipeConfig::default()
        };
        ExtractionManager::new(Arc::new(RecipeStore::new(8)), extractor, config)
    }

    #[tokio::test]
    async fn valid_candidate_is_saved() {
        let extractor = Arc::new(FixedExtractor::new(Some(good_candidate())));
        let manager = manager(extractor, true);

        let id = manager
            .maybe_extract_and_save(
                ApiKind::Rest,
                "rest:a|b",
                "list users",
                &trace(),
                &[],
                "schema",
                false,
            )
            .await;
        assert!(id.is_some());
        assert_eq!(manager.store.len(), 1);
        assert!(manager.store.get(&id.unwrap()).is_some());
    }

    #[tokio::test]
    async fn disabled_feature_never_calls_the_extractor() {
        let extractor = Arc::new(FixedExtractor::new(Some(good_candidate())));
        let manager = manager(extractor.clone(), false);

        let id = manager
            .maybe_extract_and_save(
                ApiKind::Rest,
                "rest:a|b",
                "list users",
                &trace(),
                &[],
                "schema",
                false,
            )
            .await;
        assert!(id.is_none());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skip_condition_and_empty_inputs_short_circuit() {
        let extractor = Arc::new(FixedExtractor::new(Some(good_candidate())));
        let manager = manager(extractor.clone(), true);

        // Caller skip condition.
        let id = manager
            .maybe_extract_and_save(
                ApiKind::Rest, "rest:a|b", "q", &trace(), &[], "schema", true,
            )
            .await;
        assert!(id.is_none());

        // No executed steps.
        let id = manager
            .maybe_extract_and_save(ApiKind::Rest, "rest:a|b", "q", &[], &[], "schema", false)
            .await;
        assert!(id.is_none());

        // No schema to fingerprint.
        let id = manager
            .maybe_extract_and_save(ApiKind::Rest, "rest:a|b", "q", &trace(), &[], "", false)
            .await;
        assert!(id.is_none());

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(manager.store.is_empty());
    }

    #[tokio::test]
    async fn extractor_errors_are_swallowed() {
        let manager = manager(Arc::new(FailingExtractor), true);
        let id = manager
            .maybe_extract_and_save(
                ApiKind::Rest, "rest:a|b", "q", &trace(), &[], "schema", false,
            )
            .await;
        assert!(id.is_none());
        assert!(manager.store.is_empty());
    }

    #[tokio::test]
    async fn invalid_candidate_never_reaches_the_store() {
        // Default of 5 no longer renders back to the original limit of 10.
        let mut candidate = good_candidate();
        candidate.params.insert(
            "limit".to_string(),
            ParamSpec {
                kind: ParamType::Int,
                default: Some(json!(5)),
            },
        );
        let manager = manager(Arc::new(FixedExtractor::new(Some(candidate))), true);

        let id = manager
            .maybe_extract_and_save(
                ApiKind::Rest, "rest:a|b", "q", &trace(), &[], "schema", false,
            )
            .await;
        assert!(id.is_none());
        assert!(manager.store.is_empty());
    }

    #[test]
    fn unused_param_rejects_before_equivalence_runs() {
        // The candidate's only declared parameter is referenced nowhere, so
        // param-usage validation must reject it outright.
        let mut candidate = good_candidate();
        candidate.steps = vec![RecipeStep::Rest {
            name: "users".to_string(),
            method: "GET".to_string(),
            path: "/users".to_string(),
            path_params: json!({}),
            query_params: json!({"limit": 10}),
            body: serde_json::Value::Null,
        }];
        candidate.params.clear();
        candidate.params.insert(
            "unused".to_string(),
            ParamSpec {
                kind: ParamType::Str,
                default: Some(json!("x")),
            },
        );

        let err = validate_candidate(ApiKind::Rest, &trace(), &[], candidate).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ParamsUnused);
    }

    #[test]
    fn pruned_candidate_keeps_only_referenced_params() {
        let mut candidate = good_candidate();
        candidate.params.insert(
            "orphan".to_string(),
            ParamSpec {
                kind: ParamType::Str,
                default: Some(json!("x")),
            },
        );

        let validated = validate_candidate(ApiKind::Rest, &trace(), &[], candidate).unwrap();
        assert!(validated.params.contains_key("limit"));
        assert!(!validated.params.contains_key("orphan"));
    }
}
