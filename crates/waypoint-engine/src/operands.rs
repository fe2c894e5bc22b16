//! Operand resolution against the runtime context spaces.
//!
//! `Ok(None)` is a missing value. `Ok(Some(Value::Null))` is a found null and
//! stops the precedence chain like any other found value.

use serde_json::Value;
use waypoint_config::Operand;
use waypoint_registry::{Registry, RuntimeContext};

use crate::error::EngineError;

const SPACES: [&str; 3] = ["exec", "user", "flow"];

/// Resolve an operand.
///
/// A registry resolver keyed by the operand's kind always wins over the
/// built-in handling of that kind.
pub async fn resolve_operand(
  operand: &Operand,
  ctx: &RuntimeContext,
  registry: &Registry,
) -> Result<Option<Value>, EngineError> {
  if let Some(resolver) = registry.resolver(operand.kind()) {
    return resolver
      .resolve(operand, ctx)
      .await
      .map_err(EngineError::OperandResolution);
  }

  match operand {
    Operand::Const { value } => Ok(Some(value.clone())),
    Operand::Var { path } => Ok(resolve_var(path, ctx)),
    Operand::Context { key } => Ok(resolve_context(key, ctx)),
    Operand::Fn { fn_id, .. } => match registry.resolver(fn_id) {
      Some(resolver) => resolver
        .resolve(operand, ctx)
        .await
        .map_err(EngineError::OperandResolution),
      None => Err(EngineError::UnresolvedFunctionOperand { id: fn_id.clone() }),
    },
    Operand::Custom { kind, .. } => Err(EngineError::UnresolvedFunctionOperand { id: kind.clone() }),
  }
}

/// The JSON root of a space as seen by `var` and `context` lookups. The
/// `user` space is rooted at `user.data`.
fn space_root(ctx: &RuntimeContext, space: &str) -> Option<Value> {
  match space {
    "user" => Some(Value::Object(ctx.user.data.clone())),
    other => ctx.space(other),
  }
}

fn resolve_var(path: &str, ctx: &RuntimeContext) -> Option<Value> {
  if let Some((prefix, rest)) = path.split_once('.')
    && SPACES.contains(&prefix)
  {
    return space_root(ctx, prefix).and_then(|root| get_by_path(&root, rest));
  }

  SPACES
    .iter()
    .find_map(|space| space_root(ctx, space).and_then(|root| get_by_path(&root, path)))
}

fn resolve_context(key: &str, ctx: &RuntimeContext) -> Option<Value> {
  SPACES.iter().find_map(|space| {
    space_root(ctx, space).and_then(|root| root.as_object().and_then(|map| map.get(key).cloned()))
  })
}

/// Walk a dotted path through objects and arrays. Array segments are indices.
fn get_by_path(root: &Value, path: &str) -> Option<Value> {
  if path.is_empty() {
    return None;
  }
  let mut current = root;
  for segment in path.split('.') {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(current.clone())
}
