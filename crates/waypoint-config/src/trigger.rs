use serde::{Deserialize, Serialize};

use crate::condition::ConditionNode;

/// Rate limit declared on a trigger. Enforcement belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Throttle {
  pub interval_ms: u64,
  pub max_in_interval: u32,
}

/// An event binding that starts the automation at its root node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// Event name, e.g. "user.created".
  pub event: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filter: Option<ConditionNode>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub throttle: Option<Throttle>,
}
