//! Scheduler adapters: how "run this node next" becomes a job delivery.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::JobOutcome;
use crate::error::EngineError;

/// A request to process one node of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeJob {
  pub execution_id: String,
  pub node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delay_ms: Option<u64>,
}

impl NodeJob {
  pub fn new(execution_id: impl Into<String>, node_id: impl Into<String>) -> Self {
    Self {
      execution_id: execution_id.into(),
      node_id: node_id.into(),
      delay_ms: None,
    }
  }

  pub fn delayed(mut self, delay_ms: u64) -> Self {
    self.delay_ms = Some(delay_ms);
    self
  }
}

/// A coarse request to run an execution from its root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowJob {
  pub execution_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delay_ms: Option<u64>,
}

impl FlowJob {
  pub fn new(execution_id: impl Into<String>) -> Self {
    Self {
      execution_id: execution_id.into(),
      delay_ms: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "camelCase")]
pub enum ScheduledJob {
  Node(NodeJob),
  Flow(FlowJob),
}

impl ScheduledJob {
  pub fn execution_id(&self) -> &str {
    match self {
      ScheduledJob::Node(job) => &job.execution_id,
      ScheduledJob::Flow(job) => &job.execution_id,
    }
  }

  pub fn delay_ms(&self) -> Option<u64> {
    match self {
      ScheduledJob::Node(job) => job.delay_ms,
      ScheduledJob::Flow(job) => job.delay_ms,
    }
  }
}

/// Failure to hand a job to the scheduler.
///
/// The job's state change is already committed when scheduling runs. If the
/// continuation of a join that just fired cannot be scheduled, a redelivered
/// job finds its branch already completed and the join does not fire again;
/// hosts must reschedule that continuation themselves (it is the node named
/// by the join's `to`, with `fired` set in `control.parallel`).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
  #[error("scheduler channel closed")]
  Closed,

  #[error("inline scheduler has no job handler bound")]
  Unbound,

  #[error("inline scheduler is already bound to a job handler")]
  AlreadyBound,

  /// A host queue rejected the job.
  #[error("scheduler backend error: {0}")]
  Backend(String),
}

/// Turns continuations into future job deliveries.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
  async fn schedule_node(&self, job: NodeJob) -> Result<(), SchedulerError>;

  async fn schedule_flow(&self, job: FlowJob) -> Result<(), SchedulerError>;
}

/// Processes delivered jobs. Implemented by [`Worker`](crate::Worker).
#[async_trait]
pub trait JobHandler: Send + Sync {
  async fn handle(&self, job: ScheduledJob) -> Result<JobOutcome, EngineError>;
}

/// Runs each job on the caller's task, after sleeping its delay.
///
/// Job errors are logged rather than returned to the scheduling engine.
/// Meant for tests, demos and single-process hosts.
#[derive(Default)]
pub struct InlineScheduler {
  handler: OnceLock<Weak<dyn JobHandler>>,
}

impl InlineScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bind the handler that processes jobs. Held weakly, since the handler
  /// usually owns the engine that owns this scheduler.
  pub fn bind<H: JobHandler + 'static>(&self, handler: &Arc<H>) -> Result<(), SchedulerError> {
    let handler: Weak<dyn JobHandler> = Arc::downgrade(handler) as Weak<dyn JobHandler>;
    self
      .handler
      .set(handler)
      .map_err(|_| SchedulerError::AlreadyBound)
  }

  async fn run(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
    let handler = self
      .handler
      .get()
      .and_then(Weak::upgrade)
      .ok_or(SchedulerError::Unbound)?;

    if let Some(delay) = job.delay_ms().filter(|d| *d > 0) {
      debug!(execution_id = %job.execution_id(), delay_ms = delay, "sleeping before inline job");
      tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let execution_id = job.execution_id().to_string();
    if let Err(err) = handler.handle(job).await {
      error!(
        execution_id = %execution_id,
        code = err.code(),
        error = %err.detail(),
        "inline job failed"
      );
    }
    Ok(())
  }
}

impl std::fmt::Debug for InlineScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InlineScheduler")
      .field("bound", &self.handler.get().is_some())
      .finish()
  }
}

#[async_trait]
impl SchedulerAdapter for InlineScheduler {
  async fn schedule_node(&self, job: NodeJob) -> Result<(), SchedulerError> {
    self.run(ScheduledJob::Node(job)).await
  }

  async fn schedule_flow(&self, job: FlowJob) -> Result<(), SchedulerError> {
    self.run(ScheduledJob::Flow(job)).await
  }
}

/// Pushes jobs into an unbounded channel, to be consumed by a
/// [`JobRunner`](crate::JobRunner) or by a test harness.
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
  sender: mpsc::UnboundedSender<ScheduledJob>,
}

impl ChannelScheduler {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledJob>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }

  fn push(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
    self.sender.send(job).map_err(|_| SchedulerError::Closed)
  }
}

#[async_trait]
impl SchedulerAdapter for ChannelScheduler {
  async fn schedule_node(&self, job: NodeJob) -> Result<(), SchedulerError> {
    self.push(ScheduledJob::Node(job))
  }

  async fn schedule_flow(&self, job: FlowJob) -> Result<(), SchedulerError> {
    self.push(ScheduledJob::Flow(job))
  }
}
