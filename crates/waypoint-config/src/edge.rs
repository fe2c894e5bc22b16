use serde::{Deserialize, Serialize};

use crate::condition::ConditionNode;

/// Wrapper for a condition attached to an edge or decision branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCondition {
  pub root: ConditionNode,
}

/// An explicit edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub id: String,
  pub from: String,
  pub to: String,
  /// When present the edge is only followed if the condition holds.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<EdgeCondition>,
}

impl Edge {
  pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      from: from.into(),
      to: to.into(),
      condition: None,
    }
  }

  pub fn with_condition(mut self, root: ConditionNode) -> Self {
    self.condition = Some(EdgeCondition { root });
    self
  }
}
