use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use waypoint_config::{JoinStrategy, NodeId};

use crate::event::EngineEvent;

/// The durable record of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
  pub execution_id: String,
  pub automation_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_node_id: Option<NodeId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_node_id: Option<NodeId>,
  pub started_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Host owned data. The engine never writes here.
  #[serde(default)]
  pub data: Map<String, Value>,
  /// Caller supplied data, visible to operands as `user.data`.
  #[serde(default)]
  pub user: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger_id: Option<String>,
  #[serde(default)]
  pub exec: ExecRecord,
  #[serde(default)]
  pub control: ExecutionControl,
  /// Branch membership of nodes scheduled inside a parallel branch.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub branches: HashMap<NodeId, BranchMembership>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_error: Option<LastError>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub history: Vec<HistoryEntry>,
}

impl ExecutionState {
  pub fn new(
    execution_id: impl Into<String>,
    automation_id: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      automation_id: automation_id.into(),
      current_node_id: None,
      last_node_id: None,
      started_at: now,
      updated_at: now,
      data: Map::new(),
      user: Map::new(),
      trigger_id: None,
      exec: ExecRecord::default(),
      control: ExecutionControl::default(),
      branches: HashMap::new(),
      last_error: None,
      history: Vec::new(),
    }
  }

  /// True while any join is neither fired nor satisfied.
  pub fn has_pending_join(&self) -> bool {
    self.control.parallel.values().any(JoinControl::is_pending)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecRecord {
  #[serde(default)]
  pub node_results: Map<String, Value>,
  /// Failed attempts per action node, cleared on success or exhaustion.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub attempts: HashMap<NodeId, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionControl {
  /// Join bookkeeping keyed by parallel node id.
  #[serde(default)]
  pub parallel: HashMap<NodeId, JoinControl>,
}

/// Ties a node to the parallel instance and branch it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMembership {
  pub parallel_node_id: NodeId,
  pub branch_start_id: NodeId,
}

/// Bookkeeping for one parallel node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinControl {
  pub expected: usize,
  pub completed: usize,
  pub strategy: JoinStrategy,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub count: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub to: Option<NodeId>,
  pub branches_complete: BTreeMap<NodeId, bool>,
  pub fired: bool,
  /// Membership the parallel node itself carried, inherited by `to`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<BranchMembership>,
}

impl JoinControl {
  pub fn new<'a>(
    branch_starts: impl IntoIterator<Item = &'a str>,
    strategy: JoinStrategy,
    count: Option<usize>,
    to: Option<NodeId>,
  ) -> Self {
    let branches_complete: BTreeMap<_, _> = branch_starts
      .into_iter()
      .map(|start| (start.to_string(), false))
      .collect();
    Self {
      expected: branches_complete.len(),
      completed: 0,
      strategy,
      count,
      to,
      branches_complete,
      fired: false,
      parent: None,
    }
  }

  /// Completions needed before the join fires.
  pub fn threshold(&self) -> usize {
    match self.strategy {
      JoinStrategy::WaitAll => self.expected,
      JoinStrategy::WaitAny => 1,
      JoinStrategy::Count => self.count.unwrap_or(self.expected),
    }
  }

  pub fn is_satisfied(&self) -> bool {
    match self.strategy {
      JoinStrategy::WaitAll => self.completed == self.expected,
      JoinStrategy::WaitAny | JoinStrategy::Count => self.completed >= self.threshold(),
    }
  }

  pub fn is_pending(&self) -> bool {
    !self.fired && !self.is_satisfied()
  }

  /// Record a branch completion. Returns false if the branch was already
  /// complete.
  pub fn complete_branch(&mut self, branch_start_id: &str) -> bool {
    let flag = self
      .branches_complete
      .entry(branch_start_id.to_string())
      .or_insert(false);
    if *flag {
      return false;
    }
    *flag = true;
    self.completed += 1;
    true
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
  pub at: DateTime<Utc>,
  pub node_id: NodeId,
  pub message: String,
}

/// An emitted event with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub at: DateTime<Utc>,
  #[serde(flatten)]
  pub event: EngineEvent,
}
