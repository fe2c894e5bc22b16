use std::sync::Arc;

use serde_json::Value;

use crate::context::RuntimeContext;

/// Number of operands a comparator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
  Unary,
  Binary,
}

impl Arity {
  pub fn operands(self) -> usize {
    match self {
      Arity::Unary => 1,
      Arity::Binary => 2,
    }
  }
}

/// A named boolean predicate over resolved operand values.
///
/// `None` in `args` is a missing value; `Some(Value::Null)` is a found null.
pub trait Comparator: Send + Sync {
  fn compare(&self, args: &[Option<Value>], ctx: &RuntimeContext) -> bool;
}

impl<F> Comparator for F
where
  F: Fn(&[Option<Value>], &RuntimeContext) -> bool + Send + Sync,
{
  fn compare(&self, args: &[Option<Value>], ctx: &RuntimeContext) -> bool {
    self(args, ctx)
  }
}

#[derive(Clone)]
pub struct ComparatorDef {
  pub id: String,
  pub arity: Arity,
  pub eval: Arc<dyn Comparator>,
}

impl ComparatorDef {
  pub fn new(id: impl Into<String>, arity: Arity, eval: impl Comparator + 'static) -> Self {
    Self {
      id: id.into(),
      arity,
      eval: Arc::new(eval),
    }
  }
}

impl std::fmt::Debug for ComparatorDef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ComparatorDef")
      .field("id", &self.id)
      .field("arity", &self.arity)
      .finish_non_exhaustive()
  }
}
