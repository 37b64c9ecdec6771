//! Deterministic topological ordering (Kahn's algorithm).
//!
//! Among nodes that become runnable at the same time, the smallest `order`
//! wins, then the earliest position in the recipe's node list. Two runs of
//! the same recipe therefore dispatch billed provider calls in the same
//! sequence.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use mise_config::{Edge, NodeDef};

use crate::error::ScheduleError;
use crate::graph::Graph;

/// Order nodes so that every edge `a -> b` puts `a` before `b`.
pub fn order<'a>(nodes: &'a [NodeDef], edges: &[Edge]) -> Result<Vec<&'a NodeDef>, ScheduleError> {
  Ok(
    order_indices(nodes, edges)?
      .into_iter()
      .map(|i| &nodes[i])
      .collect(),
  )
}

/// Same as [`order`], returning positions into `nodes`.
pub(crate) fn order_indices(nodes: &[NodeDef], edges: &[Edge]) -> Result<Vec<usize>, ScheduleError> {
  let graph = Graph::new(nodes, edges);
  let position: HashMap<&str, usize> = nodes
    .iter()
    .enumerate()
    .map(|(i, n)| (n.id.as_str(), i))
    .collect();

  let mut in_degree: Vec<usize> = nodes.iter().map(|n| graph.upstream(&n.id).len()).collect();

  let mut ready: BinaryHeap<Reverse<(i32, usize)>> = nodes
    .iter()
    .enumerate()
    .filter(|(i, _)| in_degree[*i] == 0)
    .map(|(i, n)| Reverse((n.order, i)))
    .collect();

  let mut scheduled = Vec::with_capacity(nodes.len());

  while let Some(Reverse((_, index))) = ready.pop() {
    scheduled.push(index);

    for next in graph.downstream(&nodes[index].id) {
      let Some(&next_index) = position.get(next.as_str()) else {
        continue;
      };
      in_degree[next_index] -= 1;
      if in_degree[next_index] == 0 {
        ready.push(Reverse((nodes[next_index].order, next_index)));
      }
    }
  }

  if scheduled.len() != nodes.len() {
    let remaining = nodes
      .iter()
      .enumerate()
      .filter(|(i, _)| !scheduled.contains(i))
      .map(|(_, n)| n.id.clone())
      .collect();
    return Err(ScheduleError::Stalled { remaining });
  }

  Ok(scheduled)
}
