use async_trait::async_trait;
use serde_json::Value;
use waypoint_config::Operand;

use crate::context::RuntimeContext;

/// A registered resolver failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("operand resolver `{kind}` failed: {message}")]
pub struct ResolveError {
  pub kind: String,
  pub message: String,
}

impl ResolveError {
  pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      message: message.into(),
    }
  }
}

/// Resolves an operand to a value. `Ok(None)` means the value is missing.
#[async_trait]
pub trait OperandResolver: Send + Sync {
  async fn resolve(
    &self,
    operand: &Operand,
    ctx: &RuntimeContext,
  ) -> Result<Option<Value>, ResolveError>;
}

/// Adapter for synchronous resolver closures.
pub struct FnResolver<F>(F);

impl<F> FnResolver<F>
where
  F: Fn(&Operand, &RuntimeContext) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self(f)
  }
}

#[async_trait]
impl<F> OperandResolver for FnResolver<F>
where
  F: Fn(&Operand, &RuntimeContext) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
  async fn resolve(
    &self,
    operand: &Operand,
    ctx: &RuntimeContext,
  ) -> Result<Option<Value>, ResolveError> {
    (self.0)(operand, ctx)
  }
}
