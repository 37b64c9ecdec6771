//! Structural validation of a recipe graph.
//!
//! Runs before anything is dispatched, so a rejected recipe never reaches a
//! capability executor.

use std::collections::{HashMap, HashSet};

use mise_config::{ActionDef, Edge, INPUT_PREFIX, NodeDef};

use crate::error::ValidationError;
use crate::graph::Graph;

/// Validate a recipe's nodes and edges.
///
/// Checks run in a fixed order and the first problem found is returned:
/// node ids, output keys, dangling references, edge/dependency agreement,
/// cycles, then input mappings.
pub fn validate(nodes: &[NodeDef], edges: &[Edge]) -> Result<(), ValidationError> {
  if nodes.is_empty() {
    return Err(ValidationError::EmptyRecipe);
  }

  let ids = check_node_ids(nodes)?;
  check_output_keys(nodes)?;
  check_dangling(nodes, edges, &ids)?;
  check_edge_agreement(nodes, edges)?;

  let graph = Graph::new(nodes, edges);
  if let Some(path) = find_cycle(nodes, &graph) {
    return Err(ValidationError::Cycle { path });
  }

  check_input_sources(nodes, &graph, &ids)?;
  check_operands(nodes)?;

  Ok(())
}

fn check_node_ids(nodes: &[NodeDef]) -> Result<HashSet<&str>, ValidationError> {
  let mut ids = HashSet::with_capacity(nodes.len());
  for node in nodes {
    if !is_valid_node_id(&node.id) {
      return Err(ValidationError::InvalidNodeId(node.id.clone()));
    }
    if node.id == INPUT_PREFIX {
      return Err(ValidationError::ReservedNodeId(node.id.clone()));
    }
    if !ids.insert(node.id.as_str()) {
      return Err(ValidationError::DuplicateNodeId(node.id.clone()));
    }
  }
  Ok(ids)
}

/// Node ids become artifact path segments and the head of `node.subpath`
/// references, so they are limited to `[A-Za-z0-9_-]+`.
fn is_valid_node_id(id: &str) -> bool {
  !id.is_empty()
    && id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn check_output_keys(nodes: &[NodeDef]) -> Result<(), ValidationError> {
  let mut owners: HashMap<&str, &str> = HashMap::with_capacity(nodes.len());
  for node in nodes {
    if let Some(first) = owners.insert(node.output_key.as_str(), node.id.as_str()) {
      return Err(ValidationError::DuplicateOutputKey {
        output_key: node.output_key.clone(),
        first: first.to_string(),
        second: node.id.clone(),
      });
    }
  }
  Ok(())
}

fn check_dangling(
  nodes: &[NodeDef],
  edges: &[Edge],
  ids: &HashSet<&str>,
) -> Result<(), ValidationError> {
  for edge in edges {
    if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
      return Err(ValidationError::DanglingEdge {
        from: edge.from.clone(),
        to: edge.to.clone(),
      });
    }
  }

  for node in nodes {
    for dependency in &node.dependencies {
      if !ids.contains(dependency.as_str()) {
        return Err(ValidationError::DanglingDependency {
          node_id: node.id.clone(),
          dependency: dependency.clone(),
        });
      }
    }
  }

  Ok(())
}

/// Edges and `dependencies` are two spellings of the same graph and must
/// describe exactly the same set of pairs.
fn check_edge_agreement(nodes: &[NodeDef], edges: &[Edge]) -> Result<(), ValidationError> {
  let by_id: HashMap<&str, &NodeDef> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
  let edge_set: HashSet<(&str, &str)> = edges
    .iter()
    .map(|e| (e.from.as_str(), e.to.as_str()))
    .collect();

  for edge in edges {
    let declared = by_id
      .get(edge.to.as_str())
      .is_some_and(|n| n.dependencies.contains(&edge.from));
    if !declared {
      return Err(ValidationError::EdgeWithoutDependency {
        from: edge.from.clone(),
        to: edge.to.clone(),
      });
    }
  }

  for node in nodes {
    for dependency in &node.dependencies {
      if !edge_set.contains(&(dependency.as_str(), node.id.as_str())) {
        return Err(ValidationError::DependencyWithoutEdge {
          node_id: node.id.clone(),
          dependency: dependency.clone(),
        });
      }
    }
  }

  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Active,
  Done,
}

/// Depth-first search for a back edge. Returns the offending path with the
/// repeated node at both ends, e.g. `a -> b -> c -> a`.
fn find_cycle(nodes: &[NodeDef], graph: &Graph) -> Option<Vec<String>> {
  let mut marks: HashMap<String, Mark> = HashMap::with_capacity(nodes.len());
  let mut stack: Vec<String> = Vec::new();

  for node in nodes {
    if marks.contains_key(&node.id) {
      continue;
    }
    if let Some(path) = visit(&node.id, graph, &mut marks, &mut stack) {
      return Some(path);
    }
  }

  None
}

fn visit(
  node_id: &str,
  graph: &Graph,
  marks: &mut HashMap<String, Mark>,
  stack: &mut Vec<String>,
) -> Option<Vec<String>> {
  marks.insert(node_id.to_string(), Mark::Active);
  stack.push(node_id.to_string());

  for next in graph.downstream(node_id) {
    match marks.get(next).copied() {
      Some(Mark::Active) => {
        let start = stack.iter().position(|n| n == next).unwrap_or(0);
        let mut path = stack[start..].to_vec();
        path.push(next.clone());
        return Some(path);
      }
      Some(Mark::Done) => {}
      None => {
        if let Some(path) = visit(next, graph, marks, stack) {
          return Some(path);
        }
      }
    }
  }

  stack.pop();
  marks.insert(node_id.to_string(), Mark::Done);
  None
}

fn check_input_sources(
  nodes: &[NodeDef],
  graph: &Graph,
  ids: &HashSet<&str>,
) -> Result<(), ValidationError> {
  for node in nodes {
    let ancestors = graph.ancestors(&node.id);
    let for_each = node.for_each.iter().map(|s| ("for_each", s));
    let mapped = node.input_mapping.iter().map(|(p, s)| (p.as_str(), s));

    for (param, source) in mapped.chain(for_each) {
      let Some(source_node) = source.node_id() else {
        continue;
      };
      if !ids.contains(source_node) {
        return Err(ValidationError::UnknownSourceNode {
          node_id: node.id.clone(),
          param: param.to_string(),
          source_node: source_node.to_string(),
        });
      }
      if !ancestors.contains(source_node) {
        return Err(ValidationError::UndeclaredDependency {
          node_id: node.id.clone(),
          param: param.to_string(),
          source_node: source_node.to_string(),
        });
      }
    }
  }
  Ok(())
}

fn check_operands(nodes: &[NodeDef]) -> Result<(), ValidationError> {
  for node in nodes {
    let ActionDef::DataProcessing { operation } = &node.action else {
      continue;
    };
    for param in operation.operands() {
      if !node.input_mapping.contains_key(param) {
        return Err(ValidationError::MissingOperand {
          node_id: node.id.clone(),
          param: param.to_string(),
        });
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{edges_for, node, node_with_deps};
  use mise_config::{DataOperation, SourceRef};

  #[test]
  fn test_valid_linear_recipe() {
    let nodes = vec![
      node("a"),
      node_with_deps("b", &["a"]),
      node_with_deps("c", &["b"]),
    ];
    assert_eq!(validate(&nodes, &edges_for(&nodes)), Ok(()));
  }

  #[test]
  fn test_empty_recipe_rejected() {
    assert_eq!(validate(&[], &[]), Err(ValidationError::EmptyRecipe));
  }

  #[test]
  fn test_cycle_reports_path() {
    let nodes = vec![
      node_with_deps("a", &["c"]),
      node_with_deps("b", &["a"]),
      node_with_deps("c", &["b"]),
    ];
    let result = validate(&nodes, &edges_for(&nodes));

    match result {
      Err(ValidationError::Cycle { path }) => {
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
        for id in ["a", "b", "c"] {
          assert!(path.iter().any(|p| p == id));
        }
      }
      other => panic!("expected cycle, got {:?}", other),
    }
  }

  #[test]
  fn test_self_dependency_is_a_cycle() {
    let nodes = vec![node_with_deps("a", &["a"])];
    let result = validate(&nodes, &edges_for(&nodes));
    assert_eq!(
      result,
      Err(ValidationError::Cycle {
        path: vec!["a".to_string(), "a".to_string()]
      })
    );
  }

  #[test]
  fn test_dangling_edge_rejected() {
    let nodes = vec![node("a")];
    let edges = vec![Edge::new("a", "ghost")];
    assert!(matches!(
      validate(&nodes, &edges),
      Err(ValidationError::DanglingEdge { .. })
    ));
  }

  #[test]
  fn test_dangling_dependency_rejected() {
    let nodes = vec![node_with_deps("a", &["ghost"])];
    assert_eq!(
      validate(&nodes, &[]),
      Err(ValidationError::DanglingDependency {
        node_id: "a".to_string(),
        dependency: "ghost".to_string(),
      })
    );
  }

  #[test]
  fn test_duplicate_output_key_rejected() {
    let mut b = node("b");
    b.output_key = "a".to_string();
    let nodes = vec![node("a"), b];
    assert!(matches!(
      validate(&nodes, &[]),
      Err(ValidationError::DuplicateOutputKey { .. })
    ));
  }

  #[test]
  fn test_duplicate_node_id_rejected() {
    let mut second = node("a");
    second.output_key = "other".to_string();
    let nodes = vec![node("a"), second];
    assert_eq!(
      validate(&nodes, &[]),
      Err(ValidationError::DuplicateNodeId("a".to_string()))
    );
  }

  #[test]
  fn test_node_id_characters_are_restricted() {
    for id in ["../../../escaped", "a/b", "a.b", "", "with space", "back\\slash"] {
      let nodes = vec![node(id)];
      assert_eq!(
        validate(&nodes, &[]),
        Err(ValidationError::InvalidNodeId(id.to_string())),
        "{id:?} should be rejected"
      );
    }

    let nodes = vec![node("gen-image_2")];
    assert_eq!(validate(&nodes, &[]), Ok(()));
  }

  #[test]
  fn test_reserved_node_id_rejected() {
    let nodes = vec![node("input")];
    assert_eq!(
      validate(&nodes, &[]),
      Err(ValidationError::ReservedNodeId("input".to_string()))
    );
  }

  #[test]
  fn test_edges_must_agree_with_dependencies() {
    let nodes = vec![node("a"), node_with_deps("b", &["a"])];
    assert!(matches!(
      validate(&nodes, &[]),
      Err(ValidationError::DependencyWithoutEdge { .. })
    ));

    let nodes = vec![node("a"), node("b")];
    assert!(matches!(
      validate(&nodes, &[Edge::new("a", "b")]),
      Err(ValidationError::EdgeWithoutDependency { .. })
    ));
  }

  #[test]
  fn test_undeclared_dependency_rejected() {
    let mut c = node_with_deps("c", &["b"]);
    c.input_mapping
      .insert("stray".to_string(), SourceRef::node("d"));
    let nodes = vec![node("a"), node_with_deps("b", &["a"]), c, node("d")];

    assert_eq!(
      validate(&nodes, &edges_for(&nodes)),
      Err(ValidationError::UndeclaredDependency {
        node_id: "c".to_string(),
        param: "stray".to_string(),
        source_node: "d".to_string(),
      })
    );
  }

  #[test]
  fn test_transitive_dependency_may_be_read() {
    let mut c = node_with_deps("c", &["b"]);
    c.input_mapping
      .insert("root".to_string(), SourceRef::node_path("a", "items.0"));
    let nodes = vec![node("a"), node_with_deps("b", &["a"]), c];

    assert_eq!(validate(&nodes, &edges_for(&nodes)), Ok(()));
  }

  #[test]
  fn test_unknown_source_node_rejected() {
    let mut a = node("a");
    a.for_each = Some(SourceRef::node("ghost"));
    let nodes = vec![a];

    assert!(matches!(
      validate(&nodes, &[]),
      Err(ValidationError::UnknownSourceNode { .. })
    ));
  }

  #[test]
  fn test_missing_operand_rejected() {
    let mut a = node("a");
    a.action = ActionDef::DataProcessing {
      operation: DataOperation::Merge {
        params: vec!["left".to_string()],
      },
    };
    assert_eq!(
      validate(&[a], &[]),
      Err(ValidationError::MissingOperand {
        node_id: "a".to_string(),
        param: "left".to_string(),
      })
    );
  }
}
