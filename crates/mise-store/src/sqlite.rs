use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::error::check_writable;
use crate::{ExecutionRecord, ExecutionStore, ExecutionUpdate, StoreError};

/// SQLite-based execution store.
///
/// The full record is kept as a JSON document next to the columns used for
/// lookups and the revision guard.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

#[derive(FromRow)]
struct RecordRow {
  record: Json<ExecutionRecord>,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if missing) a database file and run migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path.as_ref())
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
      INSERT INTO executions (execution_id, recipe_id, recipe_version, status, revision, started_at, completed_at, record)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?)
      ON CONFLICT (execution_id) DO NOTHING
      "#,
    )
    .bind(&record.execution_id)
    .bind(&record.recipe_id)
    .bind(record.recipe_version as i64)
    .bind(record.status)
    .bind(record.revision as i64)
    .bind(record.started_at)
    .bind(record.completed_at)
    .bind(Json(record))
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::AlreadyExists(record.execution_id.clone()));
    }
    Ok(())
  }

  async fn update_execution(
    &self,
    execution_id: &str,
    expected_revision: u64,
    update: ExecutionUpdate,
  ) -> Result<ExecutionRecord, StoreError> {
    let mut record = self.get_execution(execution_id).await?;
    check_writable(&record, expected_revision)?;
    record.apply(update);

    // Guarded on the revision read above so a concurrent writer loses.
    let result = sqlx::query(
      r#"
      UPDATE executions
      SET status = ?, revision = ?, completed_at = ?, record = ?
      WHERE execution_id = ? AND revision = ? AND status = 'running'
      "#,
    )
    .bind(record.status)
    .bind(record.revision as i64)
    .bind(record.completed_at)
    .bind(Json(&record))
    .bind(execution_id)
    .bind(expected_revision as i64)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      let current = self.get_execution(execution_id).await?;
      check_writable(&current, expected_revision)?;
      return Err(StoreError::Conflict {
        execution_id: execution_id.to_string(),
        expected: expected_revision,
        actual: current.revision,
      });
    }

    Ok(record)
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError> {
    let row: Option<RecordRow> = sqlx::query_as(
      r#"
      SELECT record
      FROM executions
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(|r| r.record.0)
      .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self, recipe_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
    let rows: Vec<RecordRow> = sqlx::query_as(
      r#"
      SELECT record
      FROM executions
      WHERE recipe_id = ?
      ORDER BY started_at DESC, execution_id ASC
      "#,
    )
    .bind(recipe_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.record.0).collect())
  }
}
