//! Core comparators available in every [`Registry::core`](crate::Registry::core).

use serde_json::Value;

use crate::comparator::{Arity, ComparatorDef};
use crate::context::RuntimeContext;

pub(crate) fn comparators() -> Vec<ComparatorDef> {
  vec![
    ComparatorDef::new("EQ", Arity::Binary, eq),
    ComparatorDef::new("NEQ", Arity::Binary, neq),
    ComparatorDef::new("GT", Arity::Binary, gt),
    ComparatorDef::new("LT", Arity::Binary, lt),
    ComparatorDef::new("EXISTS", Arity::Unary, exists),
  ]
}

fn pair(args: &[Option<Value>]) -> (Option<&Value>, Option<&Value>) {
  (
    args.first().and_then(Option::as_ref),
    args.get(1).and_then(Option::as_ref),
  )
}

/// Strict equality: numbers compare by value, everything else structurally.
/// A missing value only equals another missing value.
fn strictly_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
  match (a, b) {
    (None, None) => true,
    (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
      (Some(a), Some(b)) => a == b,
      _ => a == b,
    },
    (Some(a), Some(b)) => a == b,
    _ => false,
  }
}

fn eq(args: &[Option<Value>], _ctx: &RuntimeContext) -> bool {
  let (a, b) = pair(args);
  strictly_equal(a, b)
}

fn neq(args: &[Option<Value>], _ctx: &RuntimeContext) -> bool {
  let (a, b) = pair(args);
  !strictly_equal(a, b)
}

fn gt(args: &[Option<Value>], _ctx: &RuntimeContext) -> bool {
  let (a, b) = pair(args);
  to_number(a) > to_number(b)
}

fn lt(args: &[Option<Value>], _ctx: &RuntimeContext) -> bool {
  let (a, b) = pair(args);
  to_number(a) < to_number(b)
}

fn exists(args: &[Option<Value>], _ctx: &RuntimeContext) -> bool {
  matches!(args.first(), Some(Some(v)) if !v.is_null())
}

/// Numeric coercion used by the ordering comparators. Values without a
/// numeric reading become NaN, which makes every ordering false.
fn to_number(value: Option<&Value>) -> f64 {
  match value {
    None => f64::NAN,
    Some(Value::Null) => 0.0,
    Some(Value::Bool(b)) => f64::from(u8::from(*b)),
    Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
    Some(Value::String(s)) => parse_numeric(s),
    Some(Value::Array(items)) => match items.as_slice() {
      [] => 0.0,
      [Value::Array(_) | Value::Object(_) | Value::Bool(_)] => f64::NAN,
      [Value::Null] => 0.0,
      [single] => to_number(Some(single)),
      _ => f64::NAN,
    },
    Some(Value::Object(_)) => f64::NAN,
  }
}

fn parse_numeric(s: &str) -> f64 {
  let s = s.trim();
  if s.is_empty() {
    return 0.0;
  }
  match s {
    "Infinity" | "+Infinity" => return f64::INFINITY,
    "-Infinity" => return f64::NEG_INFINITY,
    _ => {}
  }
  let plain = s
    .chars()
    .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
  if !plain {
    return f64::NAN;
  }
  s.parse().unwrap_or(f64::NAN)
}
