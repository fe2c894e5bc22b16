use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use waypoint_config::ActionResult;

use crate::context::RuntimeContext;

/// An action executor failed before producing a result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
  /// Optional machine readable code, surfaced in `nodeErrored`.
  pub code: Option<String>,
  pub message: String,
}

impl ActionError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      code: None,
      message: message.into(),
    }
  }

  pub fn with_code(mut self, code: impl Into<String>) -> Self {
    self.code = Some(code.into());
    self
  }
}

/// Retry policy declared by an action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
  /// Total attempts allowed, including the first.
  pub max_attempts: u32,
  pub backoff_ms: u64,
}

/// Runs the side effect behind an action node.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
  async fn execute(
    &self,
    params: &Map<String, Value>,
    ctx: &RuntimeContext,
  ) -> Result<ActionResult, ActionError>;
}

/// Adapter turning an async closure into an [`ActionExecutor`].
///
/// The closure receives owned copies of the params and context.
pub struct FnAction<F>(F);

impl<F, Fut> FnAction<F>
where
  F: Fn(Map<String, Value>, RuntimeContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<ActionResult, ActionError>> + Send,
{
  pub fn new(f: F) -> Self {
    Self(f)
  }
}

#[async_trait]
impl<F, Fut> ActionExecutor for FnAction<F>
where
  F: Fn(Map<String, Value>, RuntimeContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<ActionResult, ActionError>> + Send,
{
  async fn execute(
    &self,
    params: &Map<String, Value>,
    ctx: &RuntimeContext,
  ) -> Result<ActionResult, ActionError> {
    (self.0)(params.clone(), ctx.clone()).await
  }
}

/// A registered action kind.
///
/// A kind without an executor is a pure marker: the node completes with no
/// result.
#[derive(Clone)]
pub struct ActionKind {
  pub kind: String,
  pub executor: Option<Arc<dyn ActionExecutor>>,
  pub retry: Option<RetryPolicy>,
}

impl ActionKind {
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      executor: None,
      retry: None,
    }
  }

  pub fn with_executor(mut self, executor: impl ActionExecutor + 'static) -> Self {
    self.executor = Some(Arc::new(executor));
    self
  }

  pub fn with_retry(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
    self.retry = Some(RetryPolicy {
      max_attempts,
      backoff_ms,
    });
    self
  }
}

impl std::fmt::Debug for ActionKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ActionKind")
      .field("kind", &self.kind)
      .field("executor", &self.executor.is_some())
      .field("retry", &self.retry)
      .finish()
  }
}
