use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Automation and run metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContext {
  pub automation_id: String,
  pub root_node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger_id: Option<String>,
  /// RFC 3339 start time of the execution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_at: Option<String>,
}

/// Per-execution progress: node results and the node currently running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecContext {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_node_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_node_id: Option<String>,
  #[serde(default)]
  pub node_results: Map<String, Value>,
}

/// Caller supplied data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
  #[serde(default)]
  pub data: Map<String, Value>,
}

/// The three named spaces visible to actions, comparators and resolvers.
///
/// Unset optional fields are omitted from [`RuntimeContext::space`], so a
/// lookup of e.g. `flow.triggerId` on a manual run reports the key as missing
/// rather than null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
  pub flow: FlowContext,
  pub exec: ExecContext,
  pub user: UserContext,
}

impl RuntimeContext {
  /// JSON view of one space (`flow`, `exec` or `user`).
  pub fn space(&self, name: &str) -> Option<Value> {
    let value = match name {
      "flow" => serde_json::to_value(&self.flow),
      "exec" => serde_json::to_value(&self.exec),
      "user" => serde_json::to_value(&self.user),
      _ => return None,
    };
    value.ok()
  }
}
