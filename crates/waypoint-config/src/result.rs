use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionStatus {
  Ok,
  Error,
}

/// Outcome returned by an action executor.
///
/// A result with [`ActionStatus::Error`] is a failure, handled the same way
/// as an executor returning `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
  pub status: ActionStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ActionResult {
  pub fn ok() -> Self {
    Self {
      status: ActionStatus::Ok,
      data: None,
      error: None,
    }
  }

  pub fn ok_with(data: serde_json::Value) -> Self {
    Self {
      status: ActionStatus::Ok,
      data: Some(data),
      error: None,
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      status: ActionStatus::Error,
      data: None,
      error: Some(message.into()),
    }
  }

  pub fn is_error(&self) -> bool {
    self.status == ActionStatus::Error
  }
}
