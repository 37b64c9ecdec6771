use std::collections::{BTreeSet, HashMap};

use mise_config::{Edge, NodeDef};

/// Graph structure for traversal and analysis.
///
/// Neighbour lists keep the order in which edges were declared, so every
/// traversal over the graph is deterministic.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  ///
  /// Edges naming unknown nodes are ignored; the validator reports them.
  pub fn new(nodes: &[NodeDef], edges: &[Edge]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      adjacency.entry(node.id.clone()).or_default();
      reverse_adjacency.entry(node.id.clone()).or_default();
    }

    for edge in edges {
      if !adjacency.contains_key(&edge.from) || !adjacency.contains_key(&edge.to) {
        continue;
      }
      adjacency
        .entry(edge.from.clone())
        .or_default()
        .push(edge.to.clone());
      reverse_adjacency
        .entry(edge.to.clone())
        .or_default()
        .push(edge.from.clone());
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// All nodes reachable by walking upstream from `node_id`, excluding itself
  /// unless it sits on a cycle.
  pub fn ancestors(&self, node_id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&str> = self.upstream(node_id).iter().map(String::as_str).collect();

    while let Some(current) = stack.pop() {
      if seen.insert(current.to_string()) {
        stack.extend(self.upstream(current).iter().map(String::as_str));
      }
    }

    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mise_config::{ActionDef, DataOperation};

  fn node(id: &str) -> NodeDef {
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

  #[test]
  fn test_neighbours_keep_declaration_order() {
    let nodes = vec![node("c"), node("a"), node("b")];
    let edges = vec![Edge::new("a", "c"), Edge::new("a", "b")];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.downstream("a"), &["c".to_string(), "b".to_string()]);
    assert_eq!(graph.upstream("b"), &["a".to_string()]);
  }

  #[test]
  fn test_ancestors_are_transitive() {
    let nodes = vec![node("a"), node("b"), node("c"), node("d")];
    let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];
    let graph = Graph::new(&nodes, &edges);

    let ancestors = graph.ancestors("c");
    assert!(ancestors.contains("a"));
    assert!(ancestors.contains("b"));
    assert!(!ancestors.contains("d"));
    assert!(graph.ancestors("a").is_empty());
  }

  #[test]
  fn test_unknown_edge_endpoints_are_ignored() {
    let nodes = vec![node("a")];
    let edges = vec![Edge::new("a", "ghost")];
    let graph = Graph::new(&nodes, &edges);

    assert!(graph.downstream("a").is_empty());
    assert!(graph.upstream("ghost").is_empty());
  }
}
