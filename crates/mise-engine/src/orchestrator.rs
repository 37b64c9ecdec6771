//! The execution state machine.
//!
//! ```text
//! Created ──▶ Running ──▶ Completed
//!                │
//!                └──────▶ Failed
//! ```
//!
//! The Running record is persisted before `execute_recipe` returns. After
//! each node settles, its attempts and output are written with a
//! revision-guarded update, so a poller sees progress and a crash leaves the
//! last settled output durable. The run ends with exactly one terminal write.

use std::collections::HashMap;
use std::sync::Arc;

use mise_artifact::Store as ArtifactStore;
use mise_capability::CapabilityRegistry;
use mise_recipe::Recipe;
use mise_store::{
  ErrorKind, ExecutionRecord, ExecutionStore, ExecutionUpdate, NodeError, NodeStatus, RecipeStore,
  StoreError,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::input::ExecutionContext;

/// Caller-supplied metadata recorded on the execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
  pub project_id: Option<String>,
  pub stage_id: Option<String>,
  pub triggered_by: Option<String>,
}

/// A running execution.
///
/// Dropping the handle does not stop the run.
#[derive(Debug)]
pub struct ExecutionHandle {
  execution_id: String,
  join: JoinHandle<Result<ExecutionRecord, EngineError>>,
}

impl ExecutionHandle {
  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Wait for the run to reach a terminal state.
  pub async fn wait(self) -> Result<ExecutionRecord, EngineError> {
    self
      .join
      .await
      .map_err(|e| EngineError::fatal(format!("execution task failed: {}", e)))?
  }
}

/// Runs recipes and answers status queries.
///
/// Cheap to clone; clones share stores, providers and the set of running
/// executions.
#[derive(Clone)]
pub struct Orchestrator {
  recipes: Arc<dyn RecipeStore>,
  executions: Arc<dyn ExecutionStore>,
  registry: Arc<CapabilityRegistry>,
  artifacts: Arc<dyn ArtifactStore>,
  notifier: Arc<dyn ExecutionNotifier>,
  config: EngineConfig,
  running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Orchestrator {
  pub fn new(
    recipes: Arc<dyn RecipeStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: CapabilityRegistry,
    artifacts: Arc<dyn ArtifactStore>,
  ) -> Self {
    Self {
      recipes,
      executions,
      registry: Arc::new(registry),
      artifacts,
      notifier: Arc::new(NoopNotifier),
      config: EngineConfig::default(),
      running: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Replace the engine configuration after validating it.
  pub fn with_config(mut self, config: EngineConfig) -> Result<Self, EngineError> {
    config.validate()?;
    self.config = config;
    Ok(self)
  }

  pub fn with_notifier(mut self, notifier: impl ExecutionNotifier + 'static) -> Self {
    self.notifier = Arc::new(notifier);
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Start an execution.
  ///
  /// Validation and the initial Running write happen before this returns;
  /// nodes are dispatched on a spawned task.
  #[instrument(
    name = "execute_recipe",
    skip(self, external_input, options),
    fields(recipe_id = %recipe_id)
  )]
  pub async fn execute_recipe(
    &self,
    recipe_id: &str,
    external_input: Value,
    options: ExecutionOptions,
  ) -> Result<ExecutionHandle, EngineError> {
    let def = self
      .recipes
      .get_recipe(recipe_id)
      .await
      .map_err(|e| match e {
        StoreError::NotFound(_) => EngineError::RecipeNotFound(recipe_id.to_string()),
        other => EngineError::from(other),
      })?;

    let recipe = Recipe::new(def)?;
    self.config.check_recipe(&recipe)?;
    if recipe.execution_config().parallel_execution {
      warn!(
        recipe_id = %recipe_id,
        "parallel execution requested, dispatching sequentially"
      );
    }

    let execution_id = uuid::Uuid::new_v4().to_string();
    let mut record = ExecutionRecord::running(&execution_id, recipe.def().clone(), external_input);
    record.project_id = options.project_id;
    record.stage_id = options.stage_id;
    record.triggered_by = options.triggered_by;

    self.executions.create_execution(&record).await?;

    info!(
      execution_id = %execution_id,
      recipe_id = %recipe_id,
      recipe_version = recipe.def().version,
      nodes = recipe.node_count(),
      "execution_started"
    );
    self.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id: execution_id.clone(),
      recipe_id: recipe_id.to_string(),
    });

    let cancel = CancellationToken::new();
    self
      .running
      .lock()
      .await
      .insert(execution_id.clone(), cancel.clone());

    let this = self.clone();
    let join = tokio::spawn(async move {
      let execution_id = record.execution_id.clone();
      let result = this.run(recipe, record, cancel).await;
      this.running.lock().await.remove(&execution_id);
      result
    });

    Ok(ExecutionHandle { execution_id, join })
  }

  /// Read an execution record. Never mutates.
  pub async fn get_execution_status(&self, execution_id: &str) -> Result<ExecutionRecord, EngineError> {
    self
      .executions
      .get_execution(execution_id)
      .await
      .map_err(|e| match e {
        StoreError::NotFound(_) => EngineError::ExecutionNotFound(execution_id.to_string()),
        other => EngineError::from(other),
      })
  }

  /// A recipe's executions, newest first.
  pub async fn get_recipe_executions(
    &self,
    recipe_id: &str,
  ) -> Result<Vec<ExecutionRecord>, EngineError> {
    Ok(self.executions.list_executions(recipe_id).await?)
  }

  /// Request cancellation. Returns false if the execution is not running in
  /// this process.
  ///
  /// The run stops at the next node boundary or retry wait and ends Failed
  /// with a `cancelled` error.
  pub async fn cancel_execution(&self, execution_id: &str) -> bool {
    match self.running.lock().await.get(execution_id) {
      Some(cancel) => {
        info!(execution_id = %execution_id, "cancellation requested");
        cancel.cancel();
        true
      }
      None => false,
    }
  }

  fn dispatcher(&self) -> Dispatcher {
    Dispatcher::new(
      self.registry.clone(),
      self.artifacts.clone(),
      self.notifier.clone(),
      self.config.clone(),
    )
  }

  #[instrument(
    name = "recipe_run",
    skip_all,
    fields(
      execution_id = %record.execution_id,
      recipe_id = %record.recipe_id,
    )
  )]
  async fn run(
    &self,
    recipe: Recipe,
    record: ExecutionRecord,
    cancel: CancellationToken,
  ) -> Result<ExecutionRecord, EngineError> {
    let execution_id = record.execution_id.clone();
    let mut revision = record.revision;
    let mut ctx = ExecutionContext::new(&execution_id, &recipe, record.external_input.clone());
    let dispatcher = self.dispatcher();
    let total = recipe.node_count();

    for (index, node) in recipe.scheduled().enumerate() {
      if cancel.is_cancelled() {
        let error = NodeError::new(ErrorKind::Cancelled, "execution cancelled");
        return self
          .finish_failed(&execution_id, revision, ExecutionUpdate::new(), error, None)
          .await;
      }

      let outcome = dispatcher.execute_action(&recipe, node, &ctx, &cancel).await;
      let update = ExecutionUpdate::new().with_results(outcome.attempts.clone());

      if outcome.is_failed() {
        let error = outcome
          .error
          .unwrap_or_else(|| NodeError::new(ErrorKind::Fatal, "node failed without an error"));
        return self
          .finish_failed(&execution_id, revision, update, error, Some(node.id.clone()))
          .await;
      }

      ctx.set_output(&node.id, outcome.output.clone());
      let update = update.with_output(&node.output_key, outcome.output);
      revision = self.persist(&execution_id, revision, update).await?.revision;

      let message = match outcome.status {
        NodeStatus::Skipped => "node skipped",
        _ => "node completed",
      };
      self.notifier.notify(ExecutionEvent::Progress {
        execution_id: execution_id.clone(),
        stage: node.id.clone(),
        message: message.to_string(),
        percent: ((index + 1) * 100 / total.max(1)) as u8,
      });
    }

    let result = recipe
      .last_node()
      .and_then(|n| ctx.node_output(&n.id))
      .cloned()
      .unwrap_or(Value::Null);

    let record = self
      .persist(&execution_id, revision, ExecutionUpdate::new().completed(result))
      .await?;

    info!(execution_id = %execution_id, "execution_completed");
    self.notifier.notify(ExecutionEvent::ExecutionCompleted {
      execution_id: execution_id.clone(),
    });
    Ok(record)
  }

  /// Terminal Failed write.
  async fn finish_failed(
    &self,
    execution_id: &str,
    revision: u64,
    update: ExecutionUpdate,
    error: NodeError,
    failed_node_id: Option<String>,
  ) -> Result<ExecutionRecord, EngineError> {
    if error.kind == ErrorKind::Cancelled {
      warn!(
        execution_id = %execution_id,
        failed_node_id = ?failed_node_id,
        "execution_cancelled"
      );
    } else {
      error!(
        execution_id = %execution_id,
        failed_node_id = ?failed_node_id,
        error = %error,
        "execution_failed"
      );
    }

    let update = update.failed(error.clone(), failed_node_id.clone());
    let record = self.persist(execution_id, revision, update).await?;

    self.notifier.notify(ExecutionEvent::ExecutionFailed {
      execution_id: execution_id.to_string(),
      error: error.to_string(),
      failed_node_id,
    });
    Ok(record)
  }

  /// Write an update guarded on `revision`.
  ///
  /// Any store failure is fatal. Unless another writer owns the record, a
  /// best-effort Failed write is attempted so the run does not stay Running,
  /// including when the failed write was itself the terminal one.
  async fn persist(
    &self,
    execution_id: &str,
    revision: u64,
    update: ExecutionUpdate,
  ) -> Result<ExecutionRecord, EngineError> {
    let failed_node_id = update.failed_node_id.clone();
    match self
      .executions
      .update_execution(execution_id, revision, update)
      .await
    {
      Ok(record) => Ok(record),
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "execution_persist_failed");

        let owned_elsewhere = matches!(e, StoreError::Conflict { .. } | StoreError::Terminal(_));
        if !owned_elsewhere {
          let fatal = NodeError::new(ErrorKind::Fatal, format!("persistence: {}", e));
          let fallback = ExecutionUpdate::new().failed(fatal, failed_node_id);
          if let Err(fallback_error) = self
            .executions
            .update_execution(execution_id, revision, fallback)
            .await
          {
            error!(
              execution_id = %execution_id,
              error = %fallback_error,
              "execution_fallback_write_failed"
            );
          }
        }

        self.notifier.notify(ExecutionEvent::ExecutionFailed {
          execution_id: execution_id.to_string(),
          error: e.to_string(),
          failed_node_id: None,
        });
        Err(e.into())
      }
    }
  }
}
