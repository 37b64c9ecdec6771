//! Test fixtures shared by the unit tests of this crate.

use mise_config::{ActionDef, DataOperation, Edge, NodeDef};

pub(crate) fn node(id: &str) -> NodeDef {
  NodeDef {
    id: id.to_string(),
    action: ActionDef::DataProcessing {
      operation: DataOperation::Collect,
    },
    order: 0,
    input_mapping: Default::default(),
    output_key: id.to_string(),
    dependencies: Default::default(),
    error_policy: None,
    for_each: None,
  }
}

pub(crate) fn node_with_deps(id: &str, deps: &[&str]) -> NodeDef {
  let mut node = node(id);
  node.dependencies = deps.iter().map(|d| d.to_string()).collect();
  node
}

/// Edges matching every node's declared dependencies.
pub(crate) fn edges_for(nodes: &[NodeDef]) -> Vec<Edge> {
  nodes
    .iter()
    .flat_map(|n| n.dependencies.iter().map(|d| Edge::new(d.clone(), n.id.clone())))
    .collect()
}
