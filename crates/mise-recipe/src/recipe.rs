use mise_config::{ErrorPolicy, ExecutionConfig, NodeDef, RecipeDef};

use crate::error::RecipeError;
use crate::schedule::order_indices;
use crate::validate::validate;

/// A validated recipe with its run order fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
  def: RecipeDef,
  order: Vec<usize>,
}

impl Recipe {
  /// Validate a definition and compute its run order.
  pub fn new(def: RecipeDef) -> Result<Self, RecipeError> {
    validate(&def.nodes, &def.edges)?;
    let order = order_indices(&def.nodes, &def.edges)?;
    Ok(Self { def, order })
  }

  pub fn id(&self) -> &str {
    &self.def.id
  }

  pub fn def(&self) -> &RecipeDef {
    &self.def
  }

  pub fn execution_config(&self) -> &ExecutionConfig {
    &self.def.execution_config
  }

  /// Nodes in dispatch order.
  pub fn scheduled(&self) -> impl Iterator<Item = &NodeDef> {
    self.order.iter().map(|&i| &self.def.nodes[i])
  }

  /// The node that runs last; its output is the execution result.
  pub fn last_node(&self) -> Option<&NodeDef> {
    self.order.last().map(|&i| &self.def.nodes[i])
  }

  pub fn node_count(&self) -> usize {
    self.order.len()
  }

  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.def.get_node(node_id)
  }

  /// The policy in force for a node.
  ///
  /// Nodes without their own policy fail the run, or are skipped with a null
  /// output when the recipe sets `continue_on_error`.
  pub fn error_policy(&self, node: &NodeDef) -> ErrorPolicy {
    match &node.error_policy {
      Some(policy) => policy.clone(),
      None if self.def.execution_config.continue_on_error => {
        ErrorPolicy::skip(serde_json::Value::Null)
      }
      None => ErrorPolicy::fail(),
    }
  }

  /// Node timeout, falling back to the recipe-level default.
  pub fn timeout_ms(&self, node: &NodeDef) -> Option<u64> {
    node
      .error_policy
      .as_ref()
      .and_then(|p| p.timeout_ms)
      .or(self.def.execution_config.timeout_ms)
  }
}
