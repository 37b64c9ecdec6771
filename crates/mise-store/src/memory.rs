use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::check_writable;
use crate::{ExecutionRecord, ExecutionStore, ExecutionUpdate, StoreError};

/// In-memory execution store.
///
/// Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutionStore {
  records: Arc<RwLock<HashMap<String, ExecutionRecord>>>,
}

impl MemoryExecutionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    let mut records = self.records.write().await;
    if records.contains_key(&record.execution_id) {
      return Err(StoreError::AlreadyExists(record.execution_id.clone()));
    }
    records.insert(record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn update_execution(
    &self,
    execution_id: &str,
    expected_revision: u64,
    update: ExecutionUpdate,
  ) -> Result<ExecutionRecord, StoreError> {
    let mut records = self.records.write().await;
    let record = records
      .get_mut(execution_id)
      .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;

    check_writable(record, expected_revision)?;
    record.apply(update);
    Ok(record.clone())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError> {
    self
      .records
      .read()
      .await
      .get(execution_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self, recipe_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
    let records = self.records.read().await;
    let mut matching: Vec<ExecutionRecord> = records
      .values()
      .filter(|r| r.recipe_id == recipe_id)
      .cloned()
      .collect();
    matching.sort_by(|a, b| {
      b.started_at
        .cmp(&a.started_at)
        .then_with(|| a.execution_id.cmp(&b.execution_id))
    });
    Ok(matching)
  }
}
