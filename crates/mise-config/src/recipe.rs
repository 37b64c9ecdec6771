use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::enums::RetryBackoff;
use crate::node::NodeDef;

/// A versioned recipe definition as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDef {
  pub id: String,
  pub name: String,
  pub stage_type: String,
  #[serde(default = "default_version")]
  pub version: u32,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  #[serde(default)]
  pub execution_config: ExecutionConfig,
}

fn default_version() -> u32 {
  1
}

impl RecipeDef {
  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.nodes.iter().find(|n| n.id == node_id)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
  /// Default per-node wall-clock budget.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default)]
  pub retry_policy: RetryPolicy,
  /// Reserved: independent branches may one day run concurrently.
  #[serde(default)]
  pub parallel_execution: bool,
  /// Nodes without an explicit error policy are skipped instead of failing
  /// the run.
  #[serde(default)]
  pub continue_on_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
  #[serde(default)]
  pub backoff: RetryBackoff,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub initial_delay_ms: Option<u64>,
}
