//! Waypoint Config
//!
//! This crate contains the serializable automation definition types for waypoint.
//! An automation is a directed graph of typed steps plus the triggers that start it.
//! These types are what hosts load (from JSON files, databases, etc.) and hand to
//! the engine; the engine trusts that they were checked by an external validator.
//!
//! JSON field names are camelCase:
//!
//! ```json
//! {
//!   "meta": { "id": "onboarding", "name": "Onboarding" },
//!   "rootNodeId": "welcome",
//!   "graph": {
//!     "nodes": [
//!       { "id": "welcome", "type": "action", "action": { "kind": "send_email" } },
//!       { "id": "done", "type": "end" }
//!     ],
//!     "edges": [{ "id": "e1", "from": "welcome", "to": "done" }]
//!   },
//!   "triggers": [{ "id": "t1", "event": "user.created" }]
//! }
//! ```

mod automation;
mod condition;
mod edge;
mod enums;
mod node;
mod result;
mod trigger;

pub use automation::{Automation, AutomationMeta, Graph, VersionInfo};
pub use condition::{ConditionNode, GroupOp, Operand};
pub use edge::{Edge, EdgeCondition};
pub use enums::JoinStrategy;
pub use node::{
  ActionSpec, DecisionBranch, JoinConfig, Node, NodeKind, NodeType, ParallelBranch, WaitSpec,
};
pub use result::{ActionResult, ActionStatus};
pub use trigger::{Throttle, Trigger};

/// Identifier of a node, unique within one graph.
pub type NodeId = String;
