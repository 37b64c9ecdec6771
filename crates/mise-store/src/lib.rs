//! Mise Store
//!
//! Storage traits and implementations for recipe definitions and execution
//! records.
//!
//! The [`ExecutionStore`] trait is the persistence sink the orchestrator
//! writes to:
//! - Creating an execution record before the first node runs
//! - Conditionally applying partial updates as nodes settle
//! - Point reads by execution id
//! - Listing a recipe's executions, newest first
//!
//! Updates are guarded by the record's `revision`. A writer must present the
//! revision it last observed; a stale revision is rejected with
//! [`StoreError::Conflict`] and a terminal record rejects every update with
//! [`StoreError::Terminal`]. This keeps a single writer per execution without
//! any in-process locking.

mod error;
mod memory;
mod recipe;
mod sqlite;
mod types;

pub use error::StoreError;
pub use memory::MemoryExecutionStore;
pub use recipe::{FsRecipeStore, MemoryRecipeStore, RecipeStore};
pub use sqlite::SqliteStore;
pub use types::{
  ErrorKind, ExecutionRecord, ExecutionStatus, ExecutionUpdate, NodeError, NodeResult, NodeStatus,
};

use async_trait::async_trait;

/// Storage trait for execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
  /// Persist a new execution record.
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

  /// Apply `update` iff the stored revision equals `expected_revision`.
  ///
  /// Returns the record as written, with its revision advanced by one.
  async fn update_execution(
    &self,
    execution_id: &str,
    expected_revision: u64,
    update: ExecutionUpdate,
  ) -> Result<ExecutionRecord, StoreError>;

  /// Get an execution record by id.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError>;

  /// List a recipe's executions ordered by start time, newest first.
  async fn list_executions(&self, recipe_id: &str) -> Result<Vec<ExecutionRecord>, StoreError>;
}
