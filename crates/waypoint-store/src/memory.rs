use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{ExecutionState, ExecutionStore, StateMutation, StoreError};

/// Process-local store. Every operation runs under one async mutex, which
/// makes [`ExecutionStore::update`] trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
  states: Mutex<HashMap<String, ExecutionState>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored executions.
  pub async fn len(&self) -> usize {
    self.states.lock().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.states.lock().await.is_empty()
  }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
  async fn load(&self, execution_id: &str) -> Result<Option<ExecutionState>, StoreError> {
    Ok(self.states.lock().await.get(execution_id).cloned())
  }

  async fn save(&self, state: &ExecutionState) -> Result<(), StoreError> {
    self
      .states
      .lock()
      .await
      .insert(state.execution_id.clone(), state.clone());
    Ok(())
  }

  async fn create_if_absent(&self, state: &ExecutionState) -> Result<ExecutionState, StoreError> {
    let mut states = self.states.lock().await;
    let stored = states
      .entry(state.execution_id.clone())
      .or_insert_with(|| state.clone());
    Ok(stored.clone())
  }

  async fn update(
    &self,
    execution_id: &str,
    mutate: StateMutation<'_>,
  ) -> Result<ExecutionState, StoreError> {
    let mut states = self.states.lock().await;
    let state = states
      .get_mut(execution_id)
      .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
    mutate(state);
    Ok(state.clone())
  }
}
