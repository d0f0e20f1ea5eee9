//! # recall-recipe
//!
//! A validated, bounded, fuzzy-matched cache of parameterized API-call + SQL
//! pipelines ("recipes"), extracted from successful executions and replayed
//! as standalone callable operations.
//!
//! ## Architecture
//!
//! ```text
//! successful execution trace + question
//!       │
//!       ▼
//! ┌───────────────────┐
//! │ ExtractionManager │  guards: enabled / skip / trace / schema
//! │  1. fingerprint   │
//! │  2. extract       │  ← RecipeExtractor (external, untrusted)
//! │  3. validate      │  ← structure + param usage + equivalence
//! │  4. save          │  ← RecipeStore (LRU, (api_id, schema_hash) keyed)
//! └────────┬──────────┘
//!          │ later, a new question
//!          ▼
//!    RecipeStore::suggest ──► ToolDescriptor listing
//!          │
//!          ▼
//! ┌───────────────────┐
//! │   RecipeRunner    │  identity guard + param validation
//! │   execute_steps   │  ← StepExecutor / TabularQueryEngine
//! └───────────────────┘
//! ```
//!
//! The validator is the trust barrier: whatever produces a candidate recipe
//! — generative, rule-based, or human-authored — its output must re-render
//! byte-for-whitespace-equivalent to the original execution before it is
//! stored. The store is the only process-wide shared state; everything else
//! is scoped to one request through [`RequestScope`].

pub mod context;
pub mod csv;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod extract;
pub mod naming;
pub mod runner;
pub mod similarity;
pub mod store;
pub mod template;
pub mod validator;

// Re-export main types
pub use context::{RequestScope, ResultSets};
pub use descriptor::{list_tool_descriptors, suggest_with_context, ToolDescriptor};
pub use engine::{
    execute_steps, QueryOutcome, RecipeRun, StepError, StepExecutor, StepOutput,
    TabularQueryEngine,
};
pub use error::RecipeError;
pub use extract::{ExtractionManager, RecipeExtractor};
pub use runner::{
    ApiCall, ApiExecutor, ApiOutcome, ApiTarget, FetchedSchema, RecipeOutput, RecipeRunner,
    SchemaFetcher,
};
pub use store::{
    build_api_id, sha256_hex, RecipeMeta, RecipeRecord, RecipeStore, RecipeSuggestion,
};
pub use template::{ParamMap, RenderError};
pub use validator::{ValidationError, ValidationErrorKind};
