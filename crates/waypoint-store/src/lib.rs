//! Waypoint Store
//!
//! This crate provides the durable per-execution record the engine reads and
//! writes on every job, the events it emits, and the storage trait hosts
//! implement to persist them.
//!
//! The [`ExecutionStore`] trait defines:
//! - Loading and saving an [`ExecutionState`] by execution id
//! - Creating a state only if none exists yet
//! - An atomic read-modify-write ([`ExecutionStore::update`]) that serializes
//!   concurrent jobs of the same execution
//!
//! [`InMemoryStore`] is a process-local implementation for tests and local runs.

mod event;
mod memory;
mod state;

pub use event::{EngineEvent, NodeErrorInfo};
pub use memory::InMemoryStore;
pub use state::{
  BranchMembership, ExecRecord, ExecutionControl, ExecutionState, HistoryEntry, JoinControl,
  LastError,
};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested execution was not found.
  #[error("execution not found: {0}")]
  NotFound(String),

  /// The backing store failed.
  #[error("store backend error: {0}")]
  Backend(String),
}

/// Mutation applied by [`ExecutionStore::update`].
pub type StateMutation<'a> = &'a mut (dyn FnMut(&mut ExecutionState) + Send);

/// Storage trait for execution state.
///
/// Implementations shared by concurrent workers must make [`update`] a
/// transactional (or compare-and-set) operation: the engine relies on it for
/// exactly-once join firing.
///
/// [`update`]: ExecutionStore::update
#[async_trait]
pub trait ExecutionStore: Send + Sync {
  /// Load an execution's state, or `None` if it does not exist.
  async fn load(&self, execution_id: &str) -> Result<Option<ExecutionState>, StoreError>;

  /// Insert or replace an execution's state.
  async fn save(&self, state: &ExecutionState) -> Result<(), StoreError>;

  /// Atomically insert `state` unless the execution already exists. Returns
  /// whichever state is stored afterwards.
  async fn create_if_absent(&self, state: &ExecutionState) -> Result<ExecutionState, StoreError>;

  /// Atomically apply `mutate` to the current stored state and persist the
  /// result, returning the new state. The closure may run more than once on
  /// stores that retry on conflict, so it must only touch the state.
  async fn update(
    &self,
    execution_id: &str,
    mutate: StateMutation<'_>,
  ) -> Result<ExecutionState, StoreError>;
}
