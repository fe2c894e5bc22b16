//! Condition trees and the operands they compare.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A boolean expression: a comparator leaf or an AND/OR group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionNode {
  Condition {
    comparator: String,
    left: Operand,
    /// Absent for unary comparators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    right: Option<Operand>,
  },
  Group {
    op: GroupOp,
    children: Vec<ConditionNode>,
  },
}

impl ConditionNode {
  pub fn unary(comparator: impl Into<String>, left: Operand) -> Self {
    ConditionNode::Condition {
      comparator: comparator.into(),
      left,
      right: None,
    }
  }

  pub fn binary(comparator: impl Into<String>, left: Operand, right: Operand) -> Self {
    ConditionNode::Condition {
      comparator: comparator.into(),
      left,
      right: Some(right),
    }
  }

  pub fn all(children: Vec<ConditionNode>) -> Self {
    ConditionNode::Group {
      op: GroupOp::And,
      children,
    }
  }

  pub fn any(children: Vec<ConditionNode>) -> Self {
    ConditionNode::Group {
      op: GroupOp::Or,
      children,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOp {
  #[serde(rename = "AND")]
  And,
  #[serde(rename = "OR")]
  Or,
}

/// A typed value source, tagged by `kind`.
///
/// Kinds other than `const`, `var`, `context` and `fn` are kept as
/// [`Operand::Custom`] with their remaining fields, and are resolved by
/// whatever resolver the registry holds for that kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
  Const { value: Value },
  /// Dotted path, optionally prefixed with `exec.`, `user.` or `flow.`.
  Var { path: String },
  /// Top-level key looked up across the context spaces.
  Context { key: String },
  Fn {
    fn_id: String,
    args: Option<Vec<Value>>,
  },
  Custom {
    kind: String,
    fields: Map<String, Value>,
  },
}

impl Operand {
  pub fn constant(value: impl Into<Value>) -> Self {
    Operand::Const {
      value: value.into(),
    }
  }

  pub fn var(path: impl Into<String>) -> Self {
    Operand::Var { path: path.into() }
  }

  pub fn context(key: impl Into<String>) -> Self {
    Operand::Context { key: key.into() }
  }

  pub fn function(fn_id: impl Into<String>) -> Self {
    Operand::Fn {
      fn_id: fn_id.into(),
      args: None,
    }
  }

  /// The operand's `kind` tag.
  pub fn kind(&self) -> &str {
    match self {
      Operand::Const { .. } => "const",
      Operand::Var { .. } => "var",
      Operand::Context { .. } => "context",
      Operand::Fn { .. } => "fn",
      Operand::Custom { kind, .. } => kind,
    }
  }
}

fn take_string(map: &mut Map<String, Value>, field: &str, kind: &str) -> Result<String, String> {
  match map.remove(field) {
    Some(Value::String(s)) => Ok(s),
    _ => Err(format!("`{kind}` operand requires a string `{field}`")),
  }
}

impl TryFrom<Value> for Operand {
  type Error = String;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    let Value::Object(mut map) = value else {
      return Err("operand must be an object".to_string());
    };
    let kind = match map.remove("kind") {
      Some(Value::String(kind)) => kind,
      _ => return Err("operand requires a string `kind`".to_string()),
    };

    match kind.as_str() {
      "const" => Ok(Operand::Const {
        value: map.remove("value").unwrap_or(Value::Null),
      }),
      "var" => Ok(Operand::Var {
        path: take_string(&mut map, "path", &kind)?,
      }),
      "context" => Ok(Operand::Context {
        key: take_string(&mut map, "key", &kind)?,
      }),
      "fn" => {
        let fn_id = take_string(&mut map, "fnId", &kind)?;
        let args = match map.remove("args") {
          None | Some(Value::Null) => None,
          Some(Value::Array(args)) => Some(args),
          Some(_) => return Err("`fn` operand `args` must be an array".to_string()),
        };
        Ok(Operand::Fn { fn_id, args })
      }
      _ => Ok(Operand::Custom { kind, fields: map }),
    }
  }
}

impl From<Operand> for Value {
  fn from(operand: Operand) -> Self {
    let mut map = Map::new();
    map.insert("kind".to_string(), Value::String(operand.kind().to_string()));
    match operand {
      Operand::Const { value } => {
        map.insert("value".to_string(), value);
      }
      Operand::Var { path } => {
        map.insert("path".to_string(), Value::String(path));
      }
      Operand::Context { key } => {
        map.insert("key".to_string(), Value::String(key));
      }
      Operand::Fn { fn_id, args } => {
        map.insert("fnId".to_string(), Value::String(fn_id));
        if let Some(args) = args {
          map.insert("args".to_string(), Value::Array(args));
        }
      }
      Operand::Custom { fields, .. } => {
        for (k, v) in fields {
          map.entry(k).or_insert(v);
        }
      }
    }
    Value::Object(map)
  }
}

impl Serialize for Operand {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    Value::from(self.clone()).serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Operand {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Operand::try_from(value).map_err(serde::de::Error::custom)
  }
}
