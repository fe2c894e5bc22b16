//! Waypoint Workflow
//!
//! Derived, read-only views over an automation graph. Indices are rebuilt for
//! every job rather than cached, so any worker can process any job without
//! shared in-memory state.

mod error;
mod indices;

pub use error::WorkflowError;
pub use indices::Indices;
