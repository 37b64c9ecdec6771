use chrono::{DateTime, Utc};
use mise_config::RecipeDef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Completed,
  Failed,
}

impl ExecutionStatus {
  /// Completed and Failed are absorbing.
  pub fn is_terminal(self) -> bool {
    !matches!(self, ExecutionStatus::Running)
  }
}

/// Outcome of one node attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Completed,
  Failed,
  Skipped,
}

/// Kind of failure recorded against a node or an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  Mapping,
  Capability,
  Timeout,
  Cancelled,
  Fatal,
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ErrorKind::Validation => "validation",
      ErrorKind::Mapping => "mapping",
      ErrorKind::Capability => "capability",
      ErrorKind::Timeout => "timeout",
      ErrorKind::Cancelled => "cancelled",
      ErrorKind::Fatal => "fatal",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
  pub kind: ErrorKind,
  pub message: String,
}

impl NodeError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }
}

impl std::fmt::Display for NodeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} error: {}", self.kind, self.message)
  }
}

/// One recorded attempt at running a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
  pub node_id: String,
  /// 1-based attempt number.
  pub attempt: u32,
  pub status: NodeStatus,
  pub resolved_input: Value,
  pub output: Value,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
  pub duration_ms: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<NodeError>,
}

/// The durable record of one recipe execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub recipe_id: String,
  pub recipe_version: u32,
  /// The definition as it was when the execution started.
  pub recipe: RecipeDef,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage_id: Option<String>,
  pub external_input: Value,
  pub status: ExecutionStatus,
  /// Node outputs keyed by output key.
  pub node_outputs: Map<String, Value>,
  pub action_results: Vec<NodeResult>,
  #[serde(default)]
  pub result: Value,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub triggered_by: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<NodeError>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failed_node_id: Option<String>,
  pub revision: u64,
}

impl ExecutionRecord {
  /// A fresh Running record at revision 0.
  pub fn running(execution_id: impl Into<String>, recipe: RecipeDef, external_input: Value) -> Self {
    Self {
      execution_id: execution_id.into(),
      recipe_id: recipe.id.clone(),
      recipe_version: recipe.version,
      recipe,
      project_id: None,
      stage_id: None,
      external_input,
      status: ExecutionStatus::Running,
      node_outputs: Map::new(),
      action_results: Vec::new(),
      result: Value::Null,
      started_at: Utc::now(),
      completed_at: None,
      triggered_by: None,
      error: None,
      failed_node_id: None,
      revision: 0,
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  /// Attempts recorded for one node, in order.
  pub fn results_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeResult> {
    self.action_results.iter().filter(move |r| r.node_id == node_id)
  }

  /// Apply a partial update and advance the revision.
  pub fn apply(&mut self, update: ExecutionUpdate) {
    self.action_results.extend(update.action_results);
    for (key, value) in update.node_outputs {
      self.node_outputs.insert(key, value);
    }
    if let Some(status) = update.status {
      self.status = status;
    }
    if let Some(result) = update.result {
      self.result = result;
    }
    if let Some(completed_at) = update.completed_at {
      self.completed_at = Some(completed_at);
    }
    if let Some(error) = update.error {
      self.error = Some(error);
    }
    if let Some(node_id) = update.failed_node_id {
      self.failed_node_id = Some(node_id);
    }
    self.revision += 1;
  }
}

/// A partial update to an [`ExecutionRecord`].
///
/// Results are appended and outputs are inserted; everything else replaces
/// the stored value when set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionUpdate {
  pub action_results: Vec<NodeResult>,
  pub node_outputs: Vec<(String, Value)>,
  pub status: Option<ExecutionStatus>,
  pub result: Option<Value>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error: Option<NodeError>,
  pub failed_node_id: Option<String>,
}

impl ExecutionUpdate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_results(mut self, results: impl IntoIterator<Item = NodeResult>) -> Self {
    self.action_results.extend(results);
    self
  }

  pub fn with_output(mut self, output_key: impl Into<String>, value: Value) -> Self {
    self.node_outputs.push((output_key.into(), value));
    self
  }

  /// Finish as Completed with the given result.
  pub fn completed(mut self, result: Value) -> Self {
    self.status = Some(ExecutionStatus::Completed);
    self.result = Some(result);
    self.completed_at = Some(Utc::now());
    self
  }

  /// Finish as Failed.
  pub fn failed(mut self, error: NodeError, failed_node_id: Option<String>) -> Self {
    self.status = Some(ExecutionStatus::Failed);
    self.error = Some(error);
    self.failed_node_id = failed_node_id;
    self.completed_at = Some(Utc::now());
    self
  }
}
