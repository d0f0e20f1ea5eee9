//! In-process recipe store with fuzzy intent matching and LRU eviction.
//!
//! The store is the only component shared across concurrent requests: a
//! process-wide, bounded cache of validated recipes keyed by
//! `(api_id, schema_hash)`. A recipe is retrievable only under the exact
//! pair it was created for — schema drift invalidates matching rather than
//! serving stale pipelines.
//!
//! All bookkeeping is serialized by one store-wide lock held only for
//! in-memory work; reads copy records out so callers never hold the lock
//! across anything slow.

use crate::naming::sanitize_tool_name;
use crate::similarity::{normalize_question, similarity};
use chrono::{DateTime, Utc};
use lru::LruCache;
use recall_core::{ApiKind, Recipe};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// SHA-256 hex digest, used to fingerprint schemas.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Identifier for a target API deployment. REST includes the resolved base
/// URL so the same OpenAPI document served against different hosts never
/// shares recipes.
pub fn build_api_id(kind: ApiKind, target_url: &str, base_url: &str) -> String {
    match kind {
        ApiKind::Graphql => format!("graphql:{target_url}"),
        ApiKind::Rest => format!("rest:{target_url}|{base_url}"),
    }
}

/// A stored recipe plus its retrieval metadata.
#[derive(Debug, Clone)]
pub struct RecipeRecord {
    pub recipe_id: String,
    pub api_id: String,
    pub schema_hash: String,
    /// Original question, verbatim.
    pub question: String,
    /// Normalized question used for matching.
    pub question_sig: String,
    pub tool_name: String,
    pub recipe: Recipe,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Lightweight match result returned by [`RecipeStore::suggest`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeSuggestion {
    pub recipe_id: String,
    /// Blend score in `[0, 1]`, rounded to four decimals.
    pub score: f64,
    pub question: String,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Identity metadata plus the recipe body, for pre-execution checks.
#[derive(Debug, Clone)]
pub struct RecipeMeta {
    pub recipe_id: String,
    pub api_id: String,
    pub schema_hash: String,
    pub recipe: Recipe,
}

struct StoreInner {
    /// Records in recency order; `push` evicts the least-recently-used
    /// entry once the capacity is reached.
    records: LruCache<String, RecipeRecord>,
    /// `(api_id, schema_hash)` → record ids.
    by_key: HashMap<(String, String), HashSet<String>>,
}

/// Thread-safe, bounded recipe store.
pub struct RecipeStore {
    inner: Mutex<StoreInner>,
}

impl RecipeStore {
    /// Create a store retaining at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(StoreInner {
                records: LruCache::new(capacity),
                by_key: HashMap::new(),
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned lock only means a panic elsewhere mid-bookkeeping; the
        // structures are still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save a validated recipe, returning its fresh id. Evicts the
    /// least-recently-used record when the store is at capacity.
    pub fn save(
        &self,
        api_id: &str,
        schema_hash: &str,
        question: &str,
        recipe: Recipe,
    ) -> String {
        let recipe_id = format!("r_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let now = Utc::now();
        let record = RecipeRecord {
            recipe_id: recipe_id.clone(),
            api_id: api_id.to_string(),
            schema_hash: schema_hash.to_string(),
            question: question.to_string(),
            question_sig: normalize_question(question),
            tool_name: recipe.tool_name.clone(),
            recipe,
            created_at: now,
            last_used_at: now,
        };

        let mut inner = self.locked();
        inner
            .by_key
            .entry((api_id.to_string(), schema_hash.to_string()))
            .or_default()
            .insert(recipe_id.clone());
        if let Some((evicted_id, evicted)) = inner.records.push(recipe_id.clone(), record) {
            if evicted_id != recipe_id {
                tracing::debug!(recipe_id = %evicted_id, "evicting least-recently-used recipe");
                remove_from_index(&mut inner.by_key, &evicted, &evicted_id);
            }
        }
        tracing::debug!(recipe_id = %recipe_id, question = %truncate(question, 40), "recipe saved");
        recipe_id
    }

    /// Fetch a recipe body by id, touching recency. Returns a copy; unknown
    /// ids yield `None`.
    pub fn get(&self, recipe_id: &str) -> Option<Recipe> {
        let mut inner = self.locked();
        let record = inner.records.get_mut(recipe_id)?;
        record.last_used_at = Utc::now();
        Some(record.recipe.clone())
    }

    /// Fetch identity metadata plus the recipe body, touching recency.
    pub fn get_meta(&self, recipe_id: &str) -> Option<RecipeMeta> {
        let mut inner = self.locked();
        let record = inner.records.get_mut(recipe_id)?;
        record.last_used_at = Utc::now();
        Some(RecipeMeta {
            recipe_id: record.recipe_id.clone(),
            api_id: record.api_id.clone(),
            schema_hash: record.schema_hash.clone(),
            recipe: record.recipe.clone(),
        })
    }

    /// Rank the bucket's recipes against a question, best first. Only
    /// strictly positive scores are returned, at most `k` of them. Ties on
    /// score fall back to recency. Does not touch recency.
    pub fn suggest(
        &self,
        api_id: &str,
        schema_hash: &str,
        question: &str,
        k: usize,
    ) -> Vec<RecipeSuggestion> {
        let q_sig = normalize_question(question);
        let candidates = self.bucket_records(api_id, schema_hash);

        let mut scored: Vec<(f64, RecipeRecord)> = candidates
            .into_iter()
            .filter_map(|record| {
                let score = similarity(&q_sig, &record.question_sig);
                (score > 0.0).then_some((score, record))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.last_used_at.cmp(&a.1.last_used_at))
        });

        let out: Vec<RecipeSuggestion> = scored
            .into_iter()
            .take(k)
            .map(|(score, record)| RecipeSuggestion {
                recipe_id: record.recipe_id,
                score: (score * 10_000.0).round() / 10_000.0,
                question: record.question,
                tool_name: record.tool_name,
                created_at: record.created_at,
                last_used_at: record.last_used_at,
            })
            .collect();

        if !out.is_empty() {
            tracing::debug!(found = out.len(), "recipe suggestions ranked");
        }
        out
    }

    /// All records in a `(api_id, schema_hash)` bucket, unordered. Copies
    /// without touching recency — used to expose every known recipe as a
    /// distinct callable, not just top-k matches.
    pub fn list(&self, api_id: &str, schema_hash: &str) -> Vec<RecipeRecord> {
        self.bucket_records(api_id, schema_hash)
    }

    /// Resolve a previously-listed, possibly-truncated tool slug back to a
    /// record. When several records share the slug, the most recently used
    /// wins.
    pub fn find_by_tool_slug(
        &self,
        api_id: &str,
        schema_hash: &str,
        slug: &str,
        max_slug_len: usize,
    ) -> Option<RecipeMeta> {
        let mut matches: Vec<RecipeRecord> = self
            .bucket_records(api_id, schema_hash)
            .into_iter()
            .filter(|record| {
                let candidate: String = sanitize_tool_name(&record.tool_name)
                    .chars()
                    .take(max_slug_len)
                    .collect();
                candidate == slug
            })
            .collect();
        matches.sort_by(|a, b| {
            (b.last_used_at, b.created_at).cmp(&(a.last_used_at, a.created_at))
        });
        matches.into_iter().next().map(|record| RecipeMeta {
            recipe_id: record.recipe_id,
            api_id: record.api_id,
            schema_hash: record.schema_hash,
            recipe: record.recipe,
        })
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.locked().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket_records(&self, api_id: &str, schema_hash: &str) -> Vec<RecipeRecord> {
        let inner = self.locked();
        let Some(ids) = inner
            .by_key
            .get(&(api_id.to_string(), schema_hash.to_string()))
        else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| inner.records.peek(id).cloned())
            .collect()
    }
}

fn remove_from_index(
    by_key: &mut HashMap<(String, String), HashSet<String>>,
    record: &RecipeRecord,
    recipe_id: &str,
) {
    let key = (record.api_id.clone(), record.schema_hash.clone());
    if let Some(ids) = by_key.get_mut(&key) {
        ids.remove(recipe_id);
        if ids.is_empty() {
            by_key.remove(&key);
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{ParamSpec, ParamType};
    use serde_json::json;

    fn empty_recipe(tool_name: &str) -> Recipe {
        Recipe {
            tool_name: tool_name.to_string(),
            ..Recipe::default()
        }
    }

    #[test]
    fn save_and_get_round_trip() {
        let store = RecipeStore::new(10);
        let mut recipe = empty_recipe("test_recipe");
        recipe.params.insert(
            "limit".to_string(),
            ParamSpec {
                kind: ParamType::Int,
                default: Some(json!(10)),
            },
        );

        let id = store.save("rest:a|b", "s", "q", recipe);
        let saved = store.get(&id).unwrap();
        assert_eq!(saved.params["limit"].default, Some(json!(10)));
        assert!(store.get("r_missing").is_none());
    }

    #[test]
    fn defaults_are_preserved_verbatim() {
        let store = RecipeStore::new(10);
        let mut recipe = empty_recipe("test_recipe");
        recipe.params.insert(
            "user_id".to_string(),
            ParamSpec {
                kind: ParamType::Str,
                default: Some(json!("123e4567-e89b-12d3-a456-426614174000")),
            },
        );

        let id = store.save("rest:spec|api", "s", "q", recipe);
        let saved = store.get(&id).unwrap();
        assert_eq!(
            saved.params["user_id"].default,
            Some(json!("123e4567-e89b-12d3-a456-426614174000"))
        );
    }

    #[test]
    fn suggest_prefers_closer_match() {
        let store = RecipeStore::new(10);
        let id1 = store.save("rest:a|b", "s", "top hotels by rating", empty_recipe("top_hotels"));
        let _id2 = store.save("rest:a|b", "s", "list users by age", empty_recipe("list_users"));

        let suggestions = store.suggest("rest:a|b", "s", "best hotels", 2);
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].recipe_id, id1);
    }

    #[test]
    fn suggest_is_restricted_to_the_bucket() {
        let store = RecipeStore::new(10);
        store.save("rest:a|b", "schema1", "top hotels", empty_recipe("top_hotels"));

        // Same api, different schema fingerprint: no matches.
        assert!(store.suggest("rest:a|b", "schema2", "top hotels", 3).is_empty());
        // Different api entirely: no matches.
        assert!(store.suggest("graphql:c", "schema1", "top hotels", 3).is_empty());
    }

    #[test]
    fn suggest_is_idempotent() {
        let store = RecipeStore::new(10);
        store.save("rest:a|b", "s", "top hotels by rating", empty_recipe("top_hotels"));
        store.save("rest:a|b", "s", "cheap hotels downtown", empty_recipe("cheap_hotels"));

        let first = store.suggest("rest:a|b", "s", "best hotels", 3);
        let second = store.suggest("rest:a|b", "s", "best hotels", 3);
        assert_eq!(first, second);
    }

    #[test]
    fn exact_question_scores_one() {
        let store = RecipeStore::new(10);
        store.save("rest:a|b", "s", "top hotels by rating", empty_recipe("top_hotels"));

        let suggestions = store.suggest("rest:a|b", "s", "top hotels by rating", 1);
        assert_eq!(suggestions[0].score, 1.0);
    }

    #[test]
    fn lru_eviction_drops_least_recently_touched() {
        let store = RecipeStore::new(3);
        let id1 = store.save("a", "s", "question one", empty_recipe("one"));
        let id2 = store.save("a", "s", "question two", empty_recipe("two"));
        let id3 = store.save("a", "s", "question three", empty_recipe("three"));

        // Touch the oldest so it survives the next insertion.
        assert!(store.get(&id1).is_some());

        let id4 = store.save("a", "s", "question four", empty_recipe("four"));
        assert_eq!(store.len(), 3);
        assert!(store.get(&id1).is_some());
        assert!(store.get(&id2).is_none(), "lru record should be evicted");
        assert!(store.get(&id3).is_some());
        assert!(store.get(&id4).is_some());
    }

    #[test]
    fn eviction_cleans_the_bucket_index() {
        let store = RecipeStore::new(1);
        let id1 = store.save("a", "s", "first", empty_recipe("first"));
        let _id2 = store.save("a", "s", "second", empty_recipe("second"));

        assert_eq!(store.len(), 1);
        assert!(store.get(&id1).is_none());
        let records = store.list("a", "s");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_name, "second");
    }

    #[test]
    fn find_by_tool_slug_resolves_truncated_names() {
        let store = RecipeStore::new(10);
        let id = store.save("a", "s", "find top hotels", empty_recipe("find_top_hotels"));

        let meta = store.find_by_tool_slug("a", "s", "find_top", 8).unwrap();
        assert_eq!(meta.recipe_id, id);
        assert!(store.find_by_tool_slug("a", "s", "other", 8).is_none());
    }

    #[test]
    fn api_id_formats() {
        assert_eq!(
            build_api_id(ApiKind::Graphql, "https://x/graphql", ""),
            "graphql:https://x/graphql"
        );
        assert_eq!(
            build_api_id(ApiKind::Rest, "https://x/spec", "https://api.x"),
            "rest:https://x/spec|https://api.x"
        );
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex("schema"),
            "df0ad6e43880f09c90ebf95f19110178aba6890df0010ebda7485029e2b543b4"
        );
        assert_eq!(sha256_hex("schema").len(), 64);
    }
}
