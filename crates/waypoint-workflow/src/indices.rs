use std::collections::HashMap;

use waypoint_config::{Edge, Graph, Node, NodeKind};

use crate::error::WorkflowError;

/// Adjacency, degree and id lookup derived from a [`Graph`].
///
/// Explicit edges always contribute. Implicit edges come from node fields:
/// decision branches and `defaultTo`, parallel branch starts and `to`, and a
/// wait node's `to`. Action and end nodes contribute none, so an action only
/// continues along edges declared explicitly.
#[derive(Debug, Clone)]
pub struct Indices<'a> {
  /// Adjacency list: node_id -> list of downstream node_ids.
  outgoing: HashMap<&'a str, Vec<&'a str>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  incoming: HashMap<&'a str, Vec<&'a str>>,
  in_degree: HashMap<&'a str, usize>,
  out_degree: HashMap<&'a str, usize>,
  node_map: HashMap<&'a str, &'a Node>,
  /// Explicit edges grouped by their source node.
  explicit: HashMap<&'a str, Vec<&'a Edge>>,
}

impl<'a> Indices<'a> {
  /// Build indices in O(N + E). Performs no semantic validation.
  pub fn build(graph: &'a Graph) -> Self {
    let mut indices = Self {
      outgoing: HashMap::with_capacity(graph.nodes.len()),
      incoming: HashMap::with_capacity(graph.nodes.len()),
      in_degree: HashMap::with_capacity(graph.nodes.len()),
      out_degree: HashMap::with_capacity(graph.nodes.len()),
      node_map: HashMap::with_capacity(graph.nodes.len()),
      explicit: HashMap::new(),
    };

    // Initialize all nodes
    for node in &graph.nodes {
      let id = node.id.as_str();
      indices.node_map.insert(id, node);
      indices.outgoing.entry(id).or_default();
      indices.incoming.entry(id).or_default();
      indices.in_degree.entry(id).or_insert(0);
      indices.out_degree.entry(id).or_insert(0);
    }

    for edge in &graph.edges {
      indices.push_edge(&edge.from, &edge.to);
      indices.explicit.entry(edge.from.as_str()).or_default().push(edge);
    }

    for node in &graph.nodes {
      match &node.kind {
        NodeKind::Decision {
          branches,
          default_to,
        } => {
          for branch in branches {
            indices.push_edge(&node.id, &branch.to);
          }
          if let Some(to) = default_to {
            indices.push_edge(&node.id, to);
          }
        }
        NodeKind::Parallel { branches, to, .. } => {
          for branch in branches {
            indices.push_edge(&node.id, &branch.start);
          }
          if let Some(to) = to {
            indices.push_edge(&node.id, to);
          }
        }
        NodeKind::Wait { to, .. } => {
          if let Some(to) = to {
            indices.push_edge(&node.id, to);
          }
        }
        NodeKind::Action { .. } | NodeKind::End {} => {}
      }
    }

    indices
  }

  fn push_edge(&mut self, from: &'a str, to: &'a str) {
    self.outgoing.entry(from).or_default().push(to);
    self.incoming.entry(to).or_default().push(from);
    *self.out_degree.entry(from).or_insert(0) += 1;
    *self.in_degree.entry(to).or_insert(0) += 1;
  }

  /// Look up a node by ID.
  pub fn node(&self, node_id: &str) -> Option<&'a Node> {
    self.node_map.get(node_id).copied()
  }

  /// Look up a node by ID, failing with [`WorkflowError::NodeNotFound`].
  pub fn require(&self, node_id: &str) -> Result<&'a Node, WorkflowError> {
    self
      .node(node_id)
      .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))
  }

  /// Get downstream nodes for a given node, explicit edges first.
  pub fn outgoing(&self, node_id: &str) -> &[&'a str] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn incoming(&self, node_id: &str) -> &[&'a str] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn in_degree(&self, node_id: &str) -> usize {
    self.in_degree.get(node_id).copied().unwrap_or(0)
  }

  pub fn out_degree(&self, node_id: &str) -> usize {
    self.out_degree.get(node_id).copied().unwrap_or(0)
  }

  /// Explicit edges leaving a node, in declaration order.
  pub fn explicit_edges(&self, node_id: &str) -> &[&'a Edge] {
    self
      .explicit
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Number of indexed nodes.
  pub fn len(&self) -> usize {
    self.node_map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.node_map.is_empty()
  }
}
