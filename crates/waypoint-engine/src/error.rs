//! Engine errors.

use waypoint_registry::ResolveError;
use waypoint_store::StoreError;
use waypoint_workflow::WorkflowError;

use crate::scheduler::SchedulerError;

/// Errors that abort a job. Action failures are not errors: they go through
/// the retry controller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// Node not found in the automation graph.
  #[error("node '{node_id}' not found in graph")]
  NodeNotFound { node_id: String },

  /// A `fn` or custom operand has no registered resolver.
  #[error("no operand resolver registered for '{id}'")]
  UnresolvedFunctionOperand { id: String },

  /// A registered operand resolver failed.
  #[error("operand resolution failed")]
  OperandResolution(#[source] ResolveError),

  #[error("store operation failed")]
  Store(#[from] StoreError),

  #[error("scheduling failed")]
  Scheduler(#[from] SchedulerError),
}

impl EngineError {
  /// Stable machine code, reported in `nodeErrored.error.code`.
  pub fn code(&self) -> &'static str {
    match self {
      EngineError::NodeNotFound { .. } => "NODE_NOT_FOUND",
      EngineError::UnresolvedFunctionOperand { .. } => "UNRESOLVED_FUNCTION_OPERAND",
      EngineError::OperandResolution(_) => "OPERAND_RESOLUTION",
      EngineError::Store(_) => "STORE",
      EngineError::Scheduler(_) => "SCHEDULER",
    }
  }

  /// The message reported to event sinks, including the underlying cause.
  pub fn detail(&self) -> String {
    match self {
      EngineError::OperandResolution(source) => format!("{self}: {source}"),
      EngineError::Store(source) => format!("{self}: {source}"),
      EngineError::Scheduler(source) => format!("{self}: {source}"),
      _ => self.to_string(),
    }
  }
}

impl From<WorkflowError> for EngineError {
  fn from(err: WorkflowError) -> Self {
    match err {
      WorkflowError::NodeNotFound(node_id) => EngineError::NodeNotFound { node_id },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codes() {
    let err = EngineError::from(WorkflowError::NodeNotFound("n1".to_string()));
    assert_eq!(err.code(), "NODE_NOT_FOUND");
    assert_eq!(err.to_string(), "node 'n1' not found in graph");

    let err = EngineError::UnresolvedFunctionOperand {
      id: "lookup".to_string(),
    };
    assert_eq!(err.code(), "UNRESOLVED_FUNCTION_OPERAND");

    let err = EngineError::OperandResolution(ResolveError::new("secret", "vault sealed"));
    assert_eq!(
      err.detail(),
      "operand resolution failed: operand resolver `secret` failed: vault sealed"
    );

    let err = EngineError::from(StoreError::Backend("disk full".to_string()));
    assert_eq!(err.code(), "STORE");
  }
}
