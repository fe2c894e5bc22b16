//! Retry and backoff for failed actions.
//!
//! The attempt counter lives in `ExecutionState.exec.attempts` so that any
//! worker can pick up the rescheduled job.

use chrono::{DateTime, Utc};
use waypoint_registry::RetryPolicy;
use waypoint_store::{ExecutionState, LastError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
  /// Run the same node again after `delay_ms`.
  Retry { attempt: u32, delay_ms: u64 },
  /// Stop this path of the flow.
  Exhausted { attempts: u32 },
}

/// Record a failed attempt and decide what happens next. Runs inside the
/// store's atomic update.
pub(crate) fn record_failure(
  state: &mut ExecutionState,
  node_id: &str,
  policy: Option<RetryPolicy>,
  message: &str,
  at: DateTime<Utc>,
) -> RetryDecision {
  let attempt = state.exec.attempts.get(node_id).copied().unwrap_or(0) + 1;
  state.last_error = Some(LastError {
    at,
    node_id: node_id.to_string(),
    message: message.to_string(),
  });

  match policy {
    Some(policy) if attempt < policy.max_attempts => {
      state.exec.attempts.insert(node_id.to_string(), attempt);
      RetryDecision::Retry {
        attempt,
        delay_ms: policy.backoff_ms,
      }
    }
    _ => {
      state.exec.attempts.remove(node_id);
      RetryDecision::Exhausted { attempts: attempt }
    }
  }
}

/// Forget previous failures of a node that just succeeded.
pub(crate) fn clear_attempts(state: &mut ExecutionState, node_id: &str) {
  state.exec.attempts.remove(node_id);
}
