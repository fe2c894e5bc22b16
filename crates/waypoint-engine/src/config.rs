use serde::{Deserialize, Serialize};

/// Configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
  /// Persist every emitted event into `ExecutionState.history`.
  #[serde(default)]
  pub enable_history: bool,
}
