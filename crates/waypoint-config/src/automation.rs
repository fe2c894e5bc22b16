use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::Node;
use crate::trigger::Trigger;

/// Semantic version attached to an automation definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationMeta {
  pub id: String,
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<VersionInfo>,
  /// ISO timestamp, informational only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
}

/// Ordered node list plus optional explicit edges.
///
/// Decision, parallel and wait nodes also carry implicit edges in their own
/// fields; see `waypoint-workflow` for how both kinds are indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Graph {
  pub nodes: Vec<Node>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub edges: Vec<Edge>,
}

/// The top-level declarative unit: metadata, graph and triggers.
///
/// `root_node_id` is the single entry point shared by every trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
  pub meta: AutomationMeta,
  pub root_node_id: String,
  pub graph: Graph,
  #[serde(default)]
  pub triggers: Vec<Trigger>,
}

impl Automation {
  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.graph.nodes.iter().find(|n| n.id == node_id)
  }

  /// Triggers listening for the given event name.
  pub fn triggers_for<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a Trigger> + 'a {
    self.triggers.iter().filter(move |t| t.event == event)
  }
}
