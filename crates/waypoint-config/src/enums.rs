use serde::{Deserialize, Serialize};

/// How a parallel node decides that its branches have joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum JoinStrategy {
  /// Every branch has completed.
  #[default]
  WaitAll,
  /// At least one branch has completed.
  WaitAny,
  /// At least `count` branches have completed.
  Count,
}
