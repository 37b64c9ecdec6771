//! Input resolution.
//!
//! Each entry of a node's input mapping is a [`SourceRef`]. External inputs
//! read from the caller's input object; node outputs read from the outputs
//! settled so far in this execution.
//!
//! ```json
//! {
//!   "count": "input.count",
//!   "details": "gen_text",
//!   "first_name": "gen_text.0.name"
//! }
//! ```
//!
//! Paths are dotted; numeric segments index arrays. A reference that cannot
//! be satisfied is a [`MappingError`] scoped to the node being resolved.

use std::collections::{BTreeMap, HashMap};

use mise_config::SourceRef;
use mise_recipe::Recipe;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
  /// The external input has no value at the path.
  #[error("input '{param}': external input has no field '{field}'")]
  MissingInput { param: String, field: String },

  /// The referenced node has not produced an output yet.
  #[error("input '{param}': node '{node_id}' has not settled")]
  NodeNotSettled { param: String, node_id: String },

  /// The referenced output has no value at the subpath.
  #[error("input '{param}': '{source_ref}' has no value")]
  MissingPath { param: String, source_ref: String },

  /// The referenced output is null.
  #[error("input '{param}': '{source_ref}' is null")]
  NullValue { param: String, source_ref: String },

  /// A fan-out source is not an array.
  #[error("for_each: '{source_ref}' is not an array")]
  NotAnArray { source_ref: String },
}

/// Execution-scoped accumulator of settled node outputs.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
  execution_id: String,
  external_input: Value,
  output_keys: HashMap<String, String>,
  node_outputs: Map<String, Value>,
}

impl ExecutionContext {
  pub fn new(execution_id: impl Into<String>, recipe: &Recipe, external_input: Value) -> Self {
    let output_keys = recipe
      .def()
      .nodes
      .iter()
      .map(|n| (n.id.clone(), n.output_key.clone()))
      .collect();

    Self {
      execution_id: execution_id.into(),
      external_input,
      output_keys,
      node_outputs: Map::new(),
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Outputs keyed by output key.
  pub fn node_outputs(&self) -> &Map<String, Value> {
    &self.node_outputs
  }

  /// The settled output of a node, if any.
  pub fn node_output(&self, node_id: &str) -> Option<&Value> {
    let key = self.output_keys.get(node_id)?;
    self.node_outputs.get(key)
  }

  /// Record a node's output under its output key.
  pub fn set_output(&mut self, node_id: &str, value: Value) {
    let key = self
      .output_keys
      .get(node_id)
      .cloned()
      .unwrap_or_else(|| node_id.to_string());
    self.node_outputs.insert(key, value);
  }
}

/// Resolve every entry of an input mapping.
pub fn resolve(
  mapping: &BTreeMap<String, SourceRef>,
  ctx: &ExecutionContext,
) -> Result<Map<String, Value>, MappingError> {
  let mut params = Map::new();
  for (param, source) in mapping {
    params.insert(param.clone(), resolve_source(param, source, ctx)?);
  }
  Ok(params)
}

/// The entries of a mapping that do resolve, for the audit trail of an
/// attempt whose mapping failed.
pub(crate) fn resolve_partial(
  mapping: &BTreeMap<String, SourceRef>,
  ctx: &ExecutionContext,
) -> Map<String, Value> {
  mapping
    .iter()
    .filter_map(|(param, source)| {
      resolve_source(param, source, ctx)
        .ok()
        .map(|value| (param.clone(), value))
    })
    .collect()
}

/// Resolve a single reference. `param` names it in errors.
pub fn resolve_source(
  param: &str,
  source: &SourceRef,
  ctx: &ExecutionContext,
) -> Result<Value, MappingError> {
  match source {
    SourceRef::ExternalInput { field } => lookup_path(&ctx.external_input, field)
      .cloned()
      .ok_or_else(|| MappingError::MissingInput {
        param: param.to_string(),
        field: field.clone(),
      }),
    SourceRef::NodeOutput { node_id, subpath } => {
      let output = ctx
        .node_output(node_id)
        .ok_or_else(|| MappingError::NodeNotSettled {
          param: param.to_string(),
          node_id: node_id.clone(),
        })?;

      let value = match subpath {
        Some(path) => lookup_path(output, path).ok_or_else(|| MappingError::MissingPath {
          param: param.to_string(),
          source_ref: source.to_string(),
        })?,
        None => output,
      };

      if value.is_null() {
        return Err(MappingError::NullValue {
          param: param.to_string(),
          source_ref: source.to_string(),
        });
      }
      Ok(value.clone())
    }
  }
}

/// Walk a dotted path. Numeric segments index arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  path.split('.').try_fold(value, |current, segment| match current {
    Value::Object(map) => map.get(segment),
    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
    _ => None,
  })
}
