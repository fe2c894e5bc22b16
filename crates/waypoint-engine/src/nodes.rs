//! Per-node-type transitions.
//!
//! A transition never touches the store: it reports what the node produced,
//! where execution continues, and the state changes to apply. The engine
//! commits all of it in one atomic update.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use waypoint_config::{
  ActionResult, ActionSpec, DecisionBranch, JoinConfig, Node, NodeKind, ParallelBranch, WaitSpec,
};
use waypoint_registry::{Registry, RuntimeContext};
use waypoint_store::{EngineEvent, JoinControl};
use waypoint_workflow::Indices;

use crate::clock::Clock;
use crate::conditions::evaluate_condition;
use crate::error::EngineError;

/// A node to schedule next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Continuation {
  pub node_id: String,
  pub delay_ms: Option<u64>,
}

impl Continuation {
  pub fn now(node_id: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      delay_ms: None,
    }
  }
}

/// State changes produced by a transition.
#[derive(Debug, Default)]
pub(crate) struct StatePatch {
  /// Stored under `exec.nodeResults[nodeId]`.
  pub node_result: Option<Value>,
  /// Fresh join bookkeeping for a parallel node.
  pub join: Option<JoinControl>,
}

#[derive(Debug, Default)]
pub(crate) struct Transition {
  pub result: Option<ActionResult>,
  pub next: Vec<Continuation>,
  pub patch: StatePatch,
  /// Observability events raised while executing the node.
  pub notices: Vec<EngineEvent>,
}

/// An action that threw or returned an error result.
#[derive(Debug, Clone)]
pub(crate) struct ActionFailure {
  pub kind: String,
  pub code: Option<String>,
  pub message: String,
}

#[derive(Debug)]
pub(crate) enum NodeOutcome {
  Transition(Transition),
  ActionFailed(ActionFailure),
}

/// Everything a transition may read.
pub(crate) struct NodeRuntime<'a> {
  pub execution_id: &'a str,
  pub registry: &'a Registry,
  pub clock: &'a dyn Clock,
  pub indices: &'a Indices<'a>,
  pub ctx: &'a RuntimeContext,
}

pub(crate) async fn execute_node(
  rt: &NodeRuntime<'_>,
  node: &Node,
) -> Result<NodeOutcome, EngineError> {
  match &node.kind {
    NodeKind::Action { action } => execute_action(rt, node, action).await,
    NodeKind::Decision {
      branches,
      default_to,
    } => execute_decision(rt, node, branches, default_to.as_deref())
      .await
      .map(NodeOutcome::Transition),
    NodeKind::Parallel { branches, join, to } => Ok(NodeOutcome::Transition(execute_parallel(
      branches,
      join.as_ref(),
      to.as_deref(),
    ))),
    NodeKind::Wait { wait, to } => Ok(NodeOutcome::Transition(execute_wait(
      rt,
      node,
      wait,
      to.as_deref(),
    ))),
    NodeKind::End {} => Ok(NodeOutcome::Transition(Transition::default())),
  }
}

async fn execute_action(
  rt: &NodeRuntime<'_>,
  node: &Node,
  action: &ActionSpec,
) -> Result<NodeOutcome, EngineError> {
  let executor = rt
    .registry
    .action(&action.kind)
    .and_then(|kind| kind.executor.clone());

  let result = match executor {
    Some(executor) => match executor.execute(&action.params, rt.ctx).await {
      Ok(result) if result.is_error() => {
        let message = result
          .error
          .clone()
          .unwrap_or_else(|| "action returned error status".to_string());
        return Ok(NodeOutcome::ActionFailed(ActionFailure {
          kind: action.kind.clone(),
          code: None,
          message,
        }));
      }
      Ok(result) => Some(result),
      Err(err) => {
        return Ok(NodeOutcome::ActionFailed(ActionFailure {
          kind: action.kind.clone(),
          code: err.code,
          message: err.message,
        }));
      }
    },
    None => {
      debug!(kind = %action.kind, "no executor for action kind");
      None
    }
  };

  let (next, notices) = follow_edges(rt, node).await?;
  Ok(NodeOutcome::Transition(Transition {
    patch: StatePatch {
      node_result: result.as_ref().and_then(|r| match serde_json::to_value(r) {
        Ok(value) => Some(value),
        Err(err) => {
          warn!(node_id = %node.id, error = %err, "action result could not be stored");
          None
        }
      }),
      join: None,
    },
    result,
    next,
    notices,
  }))
}

/// Explicit edges leaving an action. Unconditional edges always pass; the
/// others pass when their condition holds.
async fn follow_edges(
  rt: &NodeRuntime<'_>,
  node: &Node,
) -> Result<(Vec<Continuation>, Vec<EngineEvent>), EngineError> {
  let mut next = Vec::new();
  let mut matched_conditional = Vec::new();

  for edge in rt.indices.explicit_edges(&node.id) {
    match &edge.condition {
      None => next.push(Continuation::now(&edge.to)),
      Some(condition) => {
        if evaluate_condition(Some(&condition.root), rt.ctx, rt.registry).await? {
          matched_conditional.push(edge.id.clone());
          next.push(Continuation::now(&edge.to));
        }
      }
    }
  }

  let mut notices = Vec::new();
  if matched_conditional.len() > 1 {
    debug!(edges = ?matched_conditional, "multiple conditional edges matched");
    notices.push(EngineEvent::EdgeMultiMatch {
      execution_id: rt.execution_id.to_string(),
      node_id: node.id.clone(),
      matched_edge_ids: matched_conditional,
    });
  }
  Ok((next, notices))
}

async fn execute_decision(
  rt: &NodeRuntime<'_>,
  node: &Node,
  branches: &[DecisionBranch],
  default_to: Option<&str>,
) -> Result<Transition, EngineError> {
  let mut matched: Vec<&DecisionBranch> = Vec::new();
  for branch in branches {
    let Some(condition) = &branch.condition else {
      continue;
    };
    if evaluate_condition(Some(&condition.root), rt.ctx, rt.registry).await? {
      matched.push(branch);
    }
  }

  let mut transition = Transition::default();
  if matched.len() > 1 {
    transition.notices.push(EngineEvent::DecisionMultiMatch {
      execution_id: rt.execution_id.to_string(),
      node_id: node.id.clone(),
      matched_branch_ids: matched.iter().map(|b| b.id.clone()).collect(),
    });
  }

  let target = matched
    .first()
    .map(|b| b.to.as_str())
    .or_else(|| {
      branches
        .iter()
        .find(|b| b.condition.is_none())
        .map(|b| b.to.as_str())
    })
    .or(default_to);

  debug!(
    matched = matched.len(),
    target = target.unwrap_or("-"),
    "decision evaluated"
  );

  if let Some(target) = target {
    transition.next.push(Continuation::now(target));
  }
  Ok(transition)
}

fn execute_parallel(
  branches: &[ParallelBranch],
  join: Option<&JoinConfig>,
  to: Option<&str>,
) -> Transition {
  let control = JoinControl::new(
    branches.iter().map(|b| b.start.as_str()),
    join.map(|j| j.strategy).unwrap_or_default(),
    join.and_then(|j| j.count),
    to.map(str::to_string),
  );

  Transition {
    next: branches
      .iter()
      .map(|b| Continuation::now(&b.start))
      .collect(),
    patch: StatePatch {
      node_result: None,
      join: Some(control),
    },
    ..Transition::default()
  }
}

fn execute_wait(rt: &NodeRuntime<'_>, node: &Node, wait: &WaitSpec, to: Option<&str>) -> Transition {
  let Some(to) = to else {
    return Transition::default();
  };

  let delay_ms = match wait {
    WaitSpec::Duration { duration_ms } => *duration_ms,
    WaitSpec::Until { until_timestamp } => match parse_until(until_timestamp) {
      Some(target) => {
        let remaining = target - rt.clock.now();
        u64::try_from(remaining.num_milliseconds()).unwrap_or(0)
      }
      None => {
        warn!(
          node_id = %node.id,
          until = %until_timestamp,
          "invalid wait timestamp, continuing immediately"
        );
        0
      }
    },
  };

  Transition {
    next: vec![Continuation {
      node_id: to.to_string(),
      delay_ms: Some(delay_ms),
    }],
    ..Transition::default()
  }
}

/// Parse a wait target. Accepts RFC 3339, or a date-time or plain date
/// without offset, read as UTC.
fn parse_until(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(target) = DateTime::parse_from_rfc3339(raw) {
    return Some(target.with_timezone(&Utc));
  }
  if let Ok(target) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(target.and_utc());
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .map(|target| target.and_utc())
}
