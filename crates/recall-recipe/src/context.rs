//! Request-scoped mutable state for recipe execution.
//!
//! Each end-user request is an isolated unit of work: the named result sets
//! accumulated by API steps and the "last result" slot must not leak across
//! concurrent requests, while nested tasks spawned within one request must
//! see and mutate the same state. [`RequestScope`] is therefore an explicit
//! handle — constructed fresh per top-level request, passed by reference (or
//! cheap clone) into every step — whose containers are shared, so a mutation
//! made in a child task is visible to the parent.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Named in-memory tables produced by API steps, consumed by query steps.
pub type ResultSets = HashMap<String, Vec<Value>>;

/// Per-request execution state. Cloning shares the underlying containers.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    tables: Arc<Mutex<ResultSets>>,
    last_result: Arc<Mutex<Option<Vec<Value>>>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables_locked(&self) -> MutexGuard<'_, ResultSets> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_locked(&self) -> MutexGuard<'_, Option<Vec<Value>>> {
        self.last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear both containers. Called at the start of each request.
    pub fn reset(&self) {
        self.tables_locked().clear();
        *self.last_locked() = None;
    }

    /// Merge newly produced tables, overwriting same-named ones.
    pub fn merge_tables(&self, tables: ResultSets) {
        self.tables_locked().extend(tables);
    }

    /// Snapshot of the current named tables.
    pub fn tables_snapshot(&self) -> ResultSets {
        self.tables_locked().clone()
    }

    /// Run a closure against the tables without copying them out.
    pub fn with_tables<R>(&self, f: impl FnOnce(&ResultSets) -> R) -> R {
        f(&self.tables_locked())
    }

    /// Overwrite the "last result" slot.
    pub fn set_last_result(&self, rows: Vec<Value>) {
        *self.last_locked() = Some(rows);
    }

    /// Copy of the "last result" slot, if any step has produced one.
    pub fn last_result(&self) -> Option<Vec<Value>> {
        self.last_locked().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reset_clears_both_containers() {
        let scope = RequestScope::new();
        scope.merge_tables(ResultSets::from([("t".to_string(), vec![json!({"a": 1})])]));
        scope.set_last_result(vec![json!({"a": 1})]);

        scope.reset();
        assert!(scope.tables_snapshot().is_empty());
        assert!(scope.last_result().is_none());
    }

    #[test]
    fn clones_share_state() {
        let scope = RequestScope::new();
        let clone = scope.clone();
        clone.merge_tables(ResultSets::from([("t".to_string(), vec![json!(1)])]));
        assert_eq!(scope.tables_snapshot().len(), 1);
    }

    #[test]
    fn separate_scopes_are_isolated() {
        let a = RequestScope::new();
        let b = RequestScope::new();
        a.set_last_result(vec![json!(1)]);
        assert!(b.last_result().is_none());
    }

    #[tokio::test]
    async fn child_task_mutations_are_visible_to_parent() {
        let scope = RequestScope::new();
        let child = scope.clone();
        tokio::spawn(async move {
            child.merge_tables(ResultSets::from([(
                "spawned".to_string(),
                vec![json!({"id": 1})],
            )]));
            child.set_last_result(vec![json!({"id": 1})]);
        })
        .await
        .expect("child task");

        assert!(scope.tables_snapshot().contains_key("spawned"));
        assert_eq!(scope.last_result(), Some(vec![json!({"id": 1})]));
    }
}
