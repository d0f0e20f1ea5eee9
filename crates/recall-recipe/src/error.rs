//! Error types for the recipe crate's public surface.

use crate::engine::RecipeRun;
use thiserror::Error;

/// Errors surfaced by recipe lookup and replay.
///
/// Renderer and validator failures never cross this boundary: rendering
/// errors become step failures during replay, and validation failures are
/// recovered inside the extraction path.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Unknown recipe id.
    #[error("recipe not found: {recipe_id}")]
    NotFound { recipe_id: String },

    /// The live target's schema fingerprint or api id no longer matches the
    /// pair the recipe was created for.
    #[error("recipe does not match current API or schema")]
    IdentityMismatch,

    /// No schema could be loaded for the live target.
    #[error("schema not loaded")]
    SchemaUnavailable,

    /// Caller-provided parameters do not satisfy the recipe's calling
    /// convention.
    #[error("{0}")]
    InvalidParams(String),

    /// A step failed during replay. Partial progress stays visible through
    /// the attached run report.
    #[error("recipe step failed: {message}")]
    StepFailed { message: String, run: RecipeRun },
}
