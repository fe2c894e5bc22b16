//! Engine orchestrator.
//!
//! The `Engine` processes exactly one node job per call: it loads the
//! execution state, runs the node's transition, commits the outcome through
//! one atomic store update, emits events and schedules continuations. It
//! never holds execution state across two jobs, so any number of workers can
//! share one store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};
use waypoint_config::{Automation, Node, NodeKind};
use waypoint_registry::{ExecContext, FlowContext, Registry, RuntimeContext, UserContext};
use waypoint_store::{
  EngineEvent, ExecutionState, ExecutionStore, HistoryEntry, LastError, NodeErrorInfo, StoreError,
};
use waypoint_workflow::Indices;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EventSink, NoopSink};
use crate::join;
use crate::nodes::{self, ActionFailure, Continuation, NodeOutcome, NodeRuntime, Transition};
use crate::retry::{self, RetryDecision};
use crate::scheduler::{FlowJob, NodeJob, SchedulerAdapter};

/// How a started flow is handed to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartMode {
  /// Schedule the root node as a node job.
  #[default]
  PerNode,
  /// Schedule one coarse flow job.
  PerFlow,
}

/// Parameters for [`Engine::start_flow`].
#[derive(Debug, Clone, Default)]
pub struct StartFlow {
  /// Generated (UUID v4) when absent.
  pub execution_id: Option<String>,
  pub user_data: Map<String, Value>,
  pub trigger_id: Option<String>,
  pub mode: StartMode,
}

/// What processing one job led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
  /// The node completed and these nodes were scheduled.
  Completed {
    next: Vec<String>,
    flow_completed: bool,
  },
  /// The action failed and the same node was rescheduled.
  RetryScheduled { attempt: u32, delay_ms: u64 },
  /// The action failed for good; this path of the flow stops.
  Halted { attempts: u32 },
}

/// The workflow execution engine.
///
/// Generic over `N: EventSink` to allow different observation strategies.
/// Use `Engine::new()` for an engine that discards events, or
/// `Engine::with_sink()` to provide a sink.
pub struct Engine<N: EventSink = NoopSink> {
  registry: Arc<Registry>,
  store: Arc<dyn ExecutionStore>,
  scheduler: Arc<dyn SchedulerAdapter>,
  clock: Arc<dyn Clock>,
  config: EngineConfig,
  sink: N,
}

impl Engine<NoopSink> {
  pub fn new(
    registry: Arc<Registry>,
    store: Arc<dyn ExecutionStore>,
    scheduler: Arc<dyn SchedulerAdapter>,
  ) -> Self {
    Self::with_sink(registry, store, scheduler, NoopSink)
  }
}

/// Events of one job, buffered until the commit that records them.
struct JobEvents {
  record: bool,
  entries: Vec<HistoryEntry>,
}

impl JobEvents {
  fn new(record: bool) -> Self {
    Self {
      record,
      entries: Vec::new(),
    }
  }

  fn push(&mut self, at: DateTime<Utc>, event: &EngineEvent) {
    if self.record {
      self.entries.push(HistoryEntry {
        at,
        event: event.clone(),
      });
    }
  }

  /// Append the buffered entries plus `extra` to the state's history.
  fn write(&self, state: &mut ExecutionState, at: DateTime<Utc>, extra: &[EngineEvent]) {
    if !self.record {
      return;
    }
    state.history.extend(self.entries.iter().cloned());
    state.history.extend(extra.iter().map(|event| HistoryEntry {
      at,
      event: event.clone(),
    }));
  }
}

impl<N: EventSink> Engine<N> {
  /// Create an engine with a custom event sink.
  pub fn with_sink(
    registry: Arc<Registry>,
    store: Arc<dyn ExecutionStore>,
    scheduler: Arc<dyn SchedulerAdapter>,
    sink: N,
  ) -> Self {
    Self {
      registry,
      store,
      scheduler,
      clock: Arc::new(SystemClock),
      config: EngineConfig::default(),
      sink,
    }
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn store(&self) -> &Arc<dyn ExecutionStore> {
    &self.store
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  /// Start a flow: persist its initial state, emit `flowStarted` and schedule
  /// the root node (or a flow job). Returns the execution id.
  #[instrument(
    name = "start_flow",
    skip(self, automation, start),
    fields(automation_id = %automation.meta.id)
  )]
  pub async fn start_flow(
    &self,
    automation: &Automation,
    start: StartFlow,
  ) -> Result<String, EngineError> {
    let execution_id = start
      .execution_id
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let now = self.clock.now();

    let mut state = ExecutionState::new(&execution_id, &automation.meta.id, now);
    state.user = start.user_data;
    state.trigger_id = start.trigger_id;

    let started = EngineEvent::FlowStarted {
      execution_id: execution_id.clone(),
    };
    let mut events = JobEvents::new(self.config.enable_history);
    events.push(now, &started);
    events.write(&mut state, now, &[]);

    self.store.save(&state).await?;
    self.sink.emit(started);
    info!(execution_id = %execution_id, mode = ?start.mode, "flow started");

    match start.mode {
      StartMode::PerNode => {
        self
          .scheduler
          .schedule_node(NodeJob::new(&execution_id, &automation.root_node_id))
          .await?
      }
      StartMode::PerFlow => {
        self
          .scheduler
          .schedule_flow(FlowJob::new(&execution_id))
          .await?
      }
    }
    Ok(execution_id)
  }

  /// Process a coarse flow job by running the root node job.
  pub async fn handle_flow_job(
    &self,
    automation: &Automation,
    job: &FlowJob,
  ) -> Result<JobOutcome, EngineError> {
    let job = NodeJob::new(&job.execution_id, &automation.root_node_id);
    self.handle_node_job(automation, &job).await
  }

  /// Process one delivered node job.
  ///
  /// Returns an error only for fatal conditions (unknown node, operand
  /// resolution, store or scheduler failures). Whether to redeliver is up to
  /// the caller. Action failures are handled by the retry policy and reported
  /// through the returned [`JobOutcome`].
  #[instrument(
    name = "node_job",
    skip(self, automation, job),
    fields(execution_id = %job.execution_id, node_id = %job.node_id)
  )]
  pub async fn handle_node_job(
    &self,
    automation: &Automation,
    job: &NodeJob,
  ) -> Result<JobOutcome, EngineError> {
    let execution_id = job.execution_id.as_str();
    let indices = Indices::build(&automation.graph);

    let node = match indices.require(&job.node_id) {
      Ok(node) => node,
      Err(err) => {
        let err = EngineError::from(err);
        error!(error = %err, "node job aborted");
        self
          .sink
          .emit(errored_event(execution_id, &job.node_id, Some(err.code()), err.detail()));
        return Err(err);
      }
    };

    let state = self.load_or_create(automation, execution_id).await?;

    let mut events = JobEvents::new(self.config.enable_history);
    let scheduled = EngineEvent::NodeScheduled {
      execution_id: execution_id.to_string(),
      node_id: node.id.clone(),
    };
    events.push(self.clock.now(), &scheduled);
    self.sink.emit(scheduled);

    let ctx = runtime_context(automation, &state, &node.id);
    let rt = NodeRuntime {
      execution_id,
      registry: &self.registry,
      clock: self.clock.as_ref(),
      indices: &indices,
      ctx: &ctx,
    };

    match nodes::execute_node(&rt, node).await {
      Ok(NodeOutcome::Transition(transition)) => {
        self
          .complete_node(execution_id, node, transition, events)
          .await
      }
      Ok(NodeOutcome::ActionFailed(failure)) => {
        self
          .fail_action(execution_id, node, failure, events)
          .await
      }
      Err(err) => Err(self.fail_job(execution_id, node, err, events).await),
    }
  }

  async fn load_or_create(
    &self,
    automation: &Automation,
    execution_id: &str,
  ) -> Result<ExecutionState, EngineError> {
    if let Some(state) = self.store.load(execution_id).await? {
      return Ok(state);
    }
    let fresh = ExecutionState::new(execution_id, &automation.meta.id, self.clock.now());
    let state = self.store.create_if_absent(&fresh).await?;
    debug!("execution state created");
    Ok(state)
  }

  /// Commit a successful transition, emit its events and schedule what comes
  /// next.
  async fn complete_node(
    &self,
    execution_id: &str,
    node: &Node,
    transition: Transition,
    events: JobEvents,
  ) -> Result<JobOutcome, EngineError> {
    let Transition {
      result,
      next,
      patch,
      notices,
    } = transition;
    let now = self.clock.now();
    let completed = EngineEvent::NodeCompleted {
      execution_id: execution_id.to_string(),
      node_id: node.id.clone(),
      result,
    };
    let flow_completed_event = EngineEvent::FlowCompleted {
      execution_id: execution_id.to_string(),
    };
    let is_action = matches!(node.kind, NodeKind::Action { .. });

    let mut settled: Option<(Option<Continuation>, bool)> = None;
    self
      .store
      .update(execution_id, &mut |state: &mut ExecutionState| {
        state.last_node_id = Some(node.id.clone());
        state.current_node_id = next.first().map(|c| c.node_id.clone());
        state.updated_at = now;
        if let Some(value) = &patch.node_result {
          state
            .exec
            .node_results
            .insert(node.id.clone(), value.clone());
        }
        if is_action {
          retry::clear_attempts(state, &node.id);
        }
        if let Some(control) = &patch.join {
          state
            .control
            .parallel
            .insert(node.id.clone(), control.clone());
        }

        let fired = join::settle(state, node, &next);
        let flow_completed = next.is_empty() && fired.is_none() && !state.has_pending_join();

        let mut recorded = notices.clone();
        recorded.push(completed.clone());
        if flow_completed {
          recorded.push(flow_completed_event.clone());
        }
        events.write(state, now, &recorded);

        settled = Some((fired, flow_completed));
      })
      .await?;

    let (fired, flow_completed) = settled.ok_or_else(|| {
      StoreError::Backend("store update returned without applying the mutation".to_string())
    })?;

    for notice in notices {
      self.sink.emit(notice);
    }
    self.sink.emit(completed);
    info!(next = next.len(), joined = fired.is_some(), "node completed");

    // A join only fires on a node without continuations, so `fired` and
    // `next` are never both non-empty.
    let mut scheduled = Vec::with_capacity(next.len() + 1);
    for continuation in next.into_iter().chain(fired) {
      let mut job = NodeJob::new(execution_id, &continuation.node_id);
      job.delay_ms = continuation.delay_ms;
      debug!(next_node_id = %job.node_id, delay_ms = ?job.delay_ms, "scheduling node");
      self.scheduler.schedule_node(job).await?;
      scheduled.push(continuation.node_id);
    }

    if flow_completed {
      self.sink.emit(flow_completed_event);
      info!("flow completed");
    }

    Ok(JobOutcome::Completed {
      next: scheduled,
      flow_completed,
    })
  }

  /// Apply the retry policy to a failed action.
  async fn fail_action(
    &self,
    execution_id: &str,
    node: &Node,
    failure: ActionFailure,
    events: JobEvents,
  ) -> Result<JobOutcome, EngineError> {
    let policy = self
      .registry
      .action(&failure.kind)
      .and_then(|kind| kind.retry);
    let now = self.clock.now();
    let errored = errored_event(
      execution_id,
      &node.id,
      failure.code.as_deref(),
      failure.message.clone(),
    );

    let mut decided: Option<RetryDecision> = None;
    self
      .store
      .update(execution_id, &mut |state: &mut ExecutionState| {
        state.updated_at = now;
        let decision = retry::record_failure(state, &node.id, policy, &failure.message, now);
        let mut recorded = vec![errored.clone()];
        if let RetryDecision::Retry { attempt, delay_ms } = decision {
          recorded.push(retry_event(execution_id, &node.id, attempt, delay_ms));
        }
        events.write(state, now, &recorded);
        decided = Some(decision);
      })
      .await?;

    let decision = decided.ok_or_else(|| {
      StoreError::Backend("store update returned without applying the mutation".to_string())
    })?;

    self.sink.emit(errored);
    match decision {
      RetryDecision::Retry { attempt, delay_ms } => {
        warn!(
          attempt,
          delay_ms,
          error = %failure.message,
          "action failed, retry scheduled"
        );
        self
          .sink
          .emit(retry_event(execution_id, &node.id, attempt, delay_ms));
        self
          .scheduler
          .schedule_node(NodeJob::new(execution_id, &node.id).delayed(delay_ms))
          .await?;
        Ok(JobOutcome::RetryScheduled { attempt, delay_ms })
      }
      RetryDecision::Exhausted { attempts } => {
        error!(attempts, error = %failure.message, "action failed, giving up");
        Ok(JobOutcome::Halted { attempts })
      }
    }
  }

  /// Record a fatal job error and hand it back to the caller.
  async fn fail_job(
    &self,
    execution_id: &str,
    node: &Node,
    err: EngineError,
    events: JobEvents,
  ) -> EngineError {
    let now = self.clock.now();
    let message = err.detail();
    let errored = errored_event(execution_id, &node.id, Some(err.code()), message.clone());

    let persisted = self
      .store
      .update(execution_id, &mut |state: &mut ExecutionState| {
        state.updated_at = now;
        state.last_error = Some(LastError {
          at: now,
          node_id: node.id.clone(),
          message: message.clone(),
        });
        events.write(state, now, std::slice::from_ref(&errored));
      })
      .await;
    if let Err(store_err) = persisted {
      warn!(error = %store_err, "failed to persist last error");
    }

    self.sink.emit(errored);
    error!(code = err.code(), error = %message, "node job failed");
    err
  }
}

/// The context visible to actions, comparators and resolvers while `node_id`
/// runs.
fn runtime_context(automation: &Automation, state: &ExecutionState, node_id: &str) -> RuntimeContext {
  RuntimeContext {
    flow: FlowContext {
      automation_id: state.automation_id.clone(),
      root_node_id: automation.root_node_id.clone(),
      trigger_id: state.trigger_id.clone(),
      started_at: Some(state.started_at.to_rfc3339()),
    },
    exec: ExecContext {
      current_node_id: Some(node_id.to_string()),
      last_node_id: state.last_node_id.clone(),
      node_results: state.exec.node_results.clone(),
    },
    user: UserContext {
      data: state.user.clone(),
    },
  }
}

fn errored_event(
  execution_id: &str,
  node_id: &str,
  code: Option<&str>,
  message: String,
) -> EngineEvent {
  EngineEvent::NodeErrored {
    execution_id: execution_id.to_string(),
    node_id: node_id.to_string(),
    error: NodeErrorInfo {
      code: code.map(str::to_string),
      message,
    },
  }
}

fn retry_event(execution_id: &str, node_id: &str, attempt: u32, delay_ms: u64) -> EngineEvent {
  EngineEvent::NodeRetryScheduled {
    execution_id: execution_id.to_string(),
    node_id: node_id.to_string(),
    delay_ms,
    attempt,
  }
}
