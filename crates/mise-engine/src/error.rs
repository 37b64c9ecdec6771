//! Error types for recipe execution.

use mise_recipe::{RecipeError, ValidationError};
use mise_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that surface synchronously from the orchestrator.
///
/// Failures scoped to a single node never appear here. They are recorded on
/// the node's result and handled by its error policy.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The recipe graph is structurally invalid. Nothing was executed.
  #[error("recipe validation failed: {0}")]
  Validation(#[from] ValidationError),

  /// No recipe with the requested id.
  #[error("recipe not found: {0}")]
  RecipeNotFound(String),

  /// No execution with the requested id.
  #[error("execution not found: {0}")]
  ExecutionNotFound(String),

  /// The engine configuration is inconsistent.
  #[error("invalid engine configuration: {0}")]
  Config(#[from] ConfigError),

  /// Persistence is unavailable, another writer owns the execution, or the
  /// schedule is internally inconsistent. Always aborts the run.
  #[error("fatal orchestrator error: {message}")]
  Fatal { message: String },
}

impl EngineError {
  pub fn fatal(message: impl Into<String>) -> Self {
    EngineError::Fatal {
      message: message.into(),
    }
  }
}

impl From<RecipeError> for EngineError {
  fn from(e: RecipeError) -> Self {
    match e {
      RecipeError::Validation(e) => EngineError::Validation(e),
      RecipeError::Schedule(e) => EngineError::fatal(e.to_string()),
    }
  }
}

impl From<StoreError> for EngineError {
  fn from(e: StoreError) -> Self {
    EngineError::fatal(format!("persistence: {}", e))
  }
}
