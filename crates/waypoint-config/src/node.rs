use std::fmt;

use serde::{Deserialize, Serialize};

use crate::edge::EdgeCondition;
use crate::enums::JoinStrategy;

/// A step in the graph.
///
/// Type-specific fields live in [`NodeKind`], so a wait node cannot carry
/// decision branches and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
  /// Runs a registered action kind. Continues along explicit edges only.
  Action { action: ActionSpec },
  /// Takes the first branch whose condition holds, else `default_to`.
  Decision {
    branches: Vec<DecisionBranch>,
    #[serde(
      rename = "defaultTo",
      default,
      skip_serializing_if = "Option::is_none"
    )]
    default_to: Option<String>,
  },
  /// Fans out to every branch start; continues to `to` once joined.
  Parallel {
    branches: Vec<ParallelBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join: Option<JoinConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
  },
  /// Continues to `to` after a delay.
  Wait {
    wait: WaitSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
  },
  End {},
}

/// Discriminant of [`NodeKind`], handy for logging and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
  Action,
  Decision,
  Parallel,
  Wait,
  End,
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      NodeType::Action => "action",
      NodeType::Decision => "decision",
      NodeType::Parallel => "parallel",
      NodeType::Wait => "wait",
      NodeType::End => "end",
    };
    f.write_str(name)
  }
}

impl NodeKind {
  pub fn node_type(&self) -> NodeType {
    match self {
      NodeKind::Action { .. } => NodeType::Action,
      NodeKind::Decision { .. } => NodeType::Decision,
      NodeKind::Parallel { .. } => NodeType::Parallel,
      NodeKind::Wait { .. } => NodeType::Wait,
      NodeKind::End {} => NodeType::End,
    }
  }
}

impl Node {
  fn with_kind(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      kind,
      name: None,
      notes: None,
    }
  }

  pub fn node_type(&self) -> NodeType {
    self.kind.node_type()
  }

  pub fn action(id: impl Into<String>, kind: impl Into<String>) -> Self {
    Self::with_kind(
      id,
      NodeKind::Action {
        action: ActionSpec {
          kind: kind.into(),
          params: serde_json::Map::new(),
        },
      },
    )
  }

  pub fn decision(
    id: impl Into<String>,
    branches: Vec<DecisionBranch>,
    default_to: Option<&str>,
  ) -> Self {
    Self::with_kind(
      id,
      NodeKind::Decision {
        branches,
        default_to: default_to.map(str::to_string),
      },
    )
  }

  pub fn parallel(
    id: impl Into<String>,
    branches: Vec<ParallelBranch>,
    join: Option<JoinConfig>,
    to: Option<&str>,
  ) -> Self {
    Self::with_kind(
      id,
      NodeKind::Parallel {
        branches,
        join,
        to: to.map(str::to_string),
      },
    )
  }

  pub fn wait(id: impl Into<String>, wait: WaitSpec, to: Option<&str>) -> Self {
    Self::with_kind(
      id,
      NodeKind::Wait {
        wait,
        to: to.map(str::to_string),
      },
    )
  }

  pub fn end(id: impl Into<String>) -> Self {
    Self::with_kind(id, NodeKind::End {})
  }
}

/// The action to run: a registry action kind plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
  pub kind: String,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub params: serde_json::Map<String, serde_json::Value>,
}

/// A decision branch. A branch without a condition is an unconditional
/// fallback: it is taken only when no conditional branch matches, ahead of the
/// node's `defaultTo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBranch {
  pub id: String,
  pub to: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<EdgeCondition>,
}

impl DecisionBranch {
  pub fn new(id: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      to: to.into(),
      condition: None,
    }
  }

  pub fn when(mut self, root: crate::ConditionNode) -> Self {
    self.condition = Some(EdgeCondition { root });
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelBranch {
  pub id: String,
  /// First node of the branch sub-path.
  pub start: String,
}

impl ParallelBranch {
  pub fn new(id: impl Into<String>, start: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      start: start.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
  pub strategy: JoinStrategy,
  /// Only meaningful for [`JoinStrategy::Count`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WaitSpec {
  /// Fixed offset from the moment the wait node runs.
  Duration {
    #[serde(rename = "durationMs", default)]
    duration_ms: u64,
  },
  /// Absolute RFC 3339 timestamp.
  Until {
    #[serde(rename = "untilTimestamp", default)]
    until_timestamp: String,
  },
}
