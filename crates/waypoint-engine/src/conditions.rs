//! Boolean evaluation of condition trees.

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use waypoint_config::{ConditionNode, GroupOp};
use waypoint_registry::{Registry, RuntimeContext};

use crate::error::EngineError;
use crate::operands::resolve_operand;

/// Evaluate an optional condition tree. An absent tree is true.
pub async fn evaluate_condition(
  root: Option<&ConditionNode>,
  ctx: &RuntimeContext,
  registry: &Registry,
) -> Result<bool, EngineError> {
  match root {
    Some(node) => evaluate_node(node, ctx, registry).await,
    None => Ok(true),
  }
}

/// Evaluate one node of a condition tree.
///
/// Groups evaluate every child before combining, since resolvers may have
/// side effects. An unknown comparator evaluates to false.
pub fn evaluate_node<'a>(
  node: &'a ConditionNode,
  ctx: &'a RuntimeContext,
  registry: &'a Registry,
) -> BoxFuture<'a, Result<bool, EngineError>> {
  async move {
    match node {
      ConditionNode::Group { op, children } => {
        let results =
          try_join_all(children.iter().map(|child| evaluate_node(child, ctx, registry))).await?;
        Ok(match op {
          GroupOp::And => results.iter().all(|r| *r),
          GroupOp::Or => results.iter().any(|r| *r),
        })
      }
      ConditionNode::Condition {
        comparator,
        left,
        right,
      } => {
        let Some(def) = registry.comparator(comparator) else {
          tracing::debug!(comparator = %comparator, "unknown comparator, condition is false");
          return Ok(false);
        };

        let mut args = Vec::with_capacity(2);
        args.push(resolve_operand(left, ctx, registry).await?);
        if let Some(right) = right {
          args.push(resolve_operand(right, ctx, registry).await?);
        }
        Ok(def.eval.compare(&args, ctx))
      }
    }
  }
  .boxed()
}
