use thiserror::Error;

/// Structural problems found before a recipe may execute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("recipe has no nodes")]
  EmptyRecipe,

  #[error("duplicate node id: {0}")]
  DuplicateNodeId(String),

  #[error("node id '{0}' may only contain ASCII letters, digits, '_' and '-'")]
  InvalidNodeId(String),

  #[error("node id '{0}' is reserved for external input references")]
  ReservedNodeId(String),

  #[error("output key '{output_key}' is used by both '{first}' and '{second}'")]
  DuplicateOutputKey {
    output_key: String,
    first: String,
    second: String,
  },

  #[error("edge references unknown node: from={from}, to={to}")]
  DanglingEdge { from: String, to: String },

  #[error("node '{node_id}' depends on unknown node '{dependency}'")]
  DanglingDependency { node_id: String, dependency: String },

  #[error("edge {from} -> {to} is not declared as a dependency of '{to}'")]
  EdgeWithoutDependency { from: String, to: String },

  #[error("dependency '{dependency}' of '{node_id}' has no matching edge")]
  DependencyWithoutEdge { node_id: String, dependency: String },

  #[error("cycle detected: {}", .path.join(" -> "))]
  Cycle { path: Vec<String> },

  #[error("input '{param}' of node '{node_id}' references unknown node '{source_node}'")]
  UnknownSourceNode {
    node_id: String,
    param: String,
    source_node: String,
  },

  #[error(
    "input '{param}' of node '{node_id}' reads '{source_node}', which is not among its dependencies"
  )]
  UndeclaredDependency {
    node_id: String,
    param: String,
    source_node: String,
  },

  #[error("data processing node '{node_id}' reads parameter '{param}' that has no input mapping")]
  MissingOperand { node_id: String, param: String },
}

/// Internal-consistency fault: a graph that passed validation could not be
/// ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
  #[error("no runnable node left while {} remain unscheduled: {}", .remaining.len(), .remaining.join(", "))]
  Stalled { remaining: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipeError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Schedule(#[from] ScheduleError),
}
