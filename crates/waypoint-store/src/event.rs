use serde::{Deserialize, Serialize};
use waypoint_config::{ActionResult, NodeId};

/// Error detail carried by [`EngineEvent::NodeErrored`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeErrorInfo {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  pub message: String,
}

/// Observable progress of an execution, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
  tag = "type",
  rename_all = "camelCase",
  rename_all_fields = "camelCase"
)]
pub enum EngineEvent {
  FlowStarted {
    execution_id: String,
  },
  NodeScheduled {
    execution_id: String,
    node_id: NodeId,
  },
  NodeCompleted {
    execution_id: String,
    node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<ActionResult>,
  },
  FlowCompleted {
    execution_id: String,
  },
  /// More than one decision branch matched; the first one was taken.
  DecisionMultiMatch {
    execution_id: String,
    node_id: NodeId,
    matched_branch_ids: Vec<String>,
  },
  /// More than one conditional explicit edge passed; all were taken.
  EdgeMultiMatch {
    execution_id: String,
    node_id: NodeId,
    matched_edge_ids: Vec<String>,
  },
  NodeErrored {
    execution_id: String,
    node_id: NodeId,
    error: NodeErrorInfo,
  },
  NodeRetryScheduled {
    execution_id: String,
    node_id: NodeId,
    delay_ms: u64,
    /// Failed attempts so far.
    attempt: u32,
  },
}

impl EngineEvent {
  pub fn execution_id(&self) -> &str {
    match self {
      EngineEvent::FlowStarted { execution_id }
      | EngineEvent::NodeScheduled { execution_id, .. }
      | EngineEvent::NodeCompleted { execution_id, .. }
      | EngineEvent::FlowCompleted { execution_id }
      | EngineEvent::DecisionMultiMatch { execution_id, .. }
      | EngineEvent::EdgeMultiMatch { execution_id, .. }
      | EngineEvent::NodeErrored { execution_id, .. }
      | EngineEvent::NodeRetryScheduled { execution_id, .. } => execution_id,
    }
  }

  /// The node the event is about, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      EngineEvent::FlowStarted { .. } | EngineEvent::FlowCompleted { .. } => None,
      EngineEvent::NodeScheduled { node_id, .. }
      | EngineEvent::NodeCompleted { node_id, .. }
      | EngineEvent::DecisionMultiMatch { node_id, .. }
      | EngineEvent::EdgeMultiMatch { node_id, .. }
      | EngineEvent::NodeErrored { node_id, .. }
      | EngineEvent::NodeRetryScheduled { node_id, .. } => Some(node_id),
    }
  }

  /// The `type` tag.
  pub fn name(&self) -> &'static str {
    match self {
      EngineEvent::FlowStarted { .. } => "flowStarted",
      EngineEvent::NodeScheduled { .. } => "nodeScheduled",
      EngineEvent::NodeCompleted { .. } => "nodeCompleted",
      EngineEvent::FlowCompleted { .. } => "flowCompleted",
      EngineEvent::DecisionMultiMatch { .. } => "decisionMultiMatch",
      EngineEvent::EdgeMultiMatch { .. } => "edgeMultiMatch",
      EngineEvent::NodeErrored { .. } => "nodeErrored",
      EngineEvent::NodeRetryScheduled { .. } => "nodeRetryScheduled",
    }
  }
}
