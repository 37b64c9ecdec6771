/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// The record changed since the writer last read it.
  #[error("execution '{execution_id}' is at revision {actual}, expected {expected}")]
  Conflict {
    execution_id: String,
    expected: u64,
    actual: u64,
  },

  /// The record is terminal and can no longer change.
  #[error("execution '{0}' is terminal")]
  Terminal(String),

  /// A record with the same id already exists.
  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// A filesystem error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A stored document could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

/// Reject a write against a terminal record or a stale revision.
pub(crate) fn check_writable(
  record: &crate::ExecutionRecord,
  expected_revision: u64,
) -> Result<(), StoreError> {
  if record.is_terminal() {
    return Err(StoreError::Terminal(record.execution_id.clone()));
  }
  if record.revision != expected_revision {
    return Err(StoreError::Conflict {
      execution_id: record.execution_id.clone(),
      expected: expected_revision,
      actual: record.revision,
    });
  }
  Ok(())
}
