//! Branch membership and join bookkeeping.
//!
//! Everything here runs inside the store's atomic update, so each
//! read-modify-write of a [`JoinControl`] is serialized per execution.

use tracing::debug;
use waypoint_config::{Node, NodeKind};
use waypoint_store::{BranchMembership, ExecutionState};

use crate::nodes::Continuation;

/// Update branch membership for a completed node and record branch
/// completion. Returns the join continuation if a join fired.
///
/// Call after the node's own state patch has been applied.
pub(crate) fn settle(
  state: &mut ExecutionState,
  node: &Node,
  next: &[Continuation],
) -> Option<Continuation> {
  let incoming = state.branches.remove(&node.id);

  if let NodeKind::Parallel { .. } = node.kind {
    for continuation in next {
      state.branches.insert(
        continuation.node_id.clone(),
        BranchMembership {
          parallel_node_id: node.id.clone(),
          branch_start_id: continuation.node_id.clone(),
        },
      );
    }
    if let Some(join) = state.control.parallel.get_mut(&node.id) {
      join.parent = incoming;
      // A parallel node without branches has nothing to wait for.
      if next.is_empty() && join.is_satisfied() {
        let parent = join.parent.clone();
        return fire(state, &node.id, parent);
      }
    }
    return None;
  }

  let membership = incoming?;
  if !next.is_empty() {
    for continuation in next {
      state
        .branches
        .entry(continuation.node_id.clone())
        .or_insert_with(|| membership.clone());
    }
    return None;
  }

  complete_branch(state, membership)
}

/// Record a branch-terminal completion, walking up through nested joins
/// that fire without a `to`.
fn complete_branch(
  state: &mut ExecutionState,
  membership: BranchMembership,
) -> Option<Continuation> {
  let BranchMembership {
    parallel_node_id,
    branch_start_id,
  } = membership;

  let join = state.control.parallel.get_mut(&parallel_node_id)?;
  let newly_completed = join.complete_branch(&branch_start_id);
  debug!(
    parallel_node_id = %parallel_node_id,
    branch_start_id = %branch_start_id,
    newly_completed,
    completed = join.completed,
    expected = join.expected,
    "branch completed"
  );

  if join.fired || !join.is_satisfied() {
    return None;
  }
  let parent = join.parent.clone();
  fire(state, &parallel_node_id, parent)
}

fn fire(
  state: &mut ExecutionState,
  parallel_node_id: &str,
  parent: Option<BranchMembership>,
) -> Option<Continuation> {
  let join = state.control.parallel.get_mut(parallel_node_id)?;
  join.fired = true;
  let to = join.to.clone();
  debug!(parallel_node_id = %parallel_node_id, to = ?to, "join fired");

  match to {
    Some(to) => {
      if let Some(parent) = parent {
        state.branches.insert(to.clone(), parent);
      }
      Some(Continuation::now(to))
    }
    // The whole parallel block was the tail of an enclosing branch.
    None => complete_branch(state, parent?),
  }
}
