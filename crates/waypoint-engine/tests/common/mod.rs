//! Deterministic harness: jobs go through a channel scheduler, time is a
//! manual clock, and the test decides which due job runs when.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use waypoint_config::Automation;
use waypoint_engine::{
  ChannelScheduler, ChannelSink, Clock, Engine, EngineConfig, EngineError, EngineEvent, JobHandler,
  JobOutcome, ManualClock, ScheduledJob, StartFlow, StartMode, Worker,
};
use waypoint_registry::Registry;
use waypoint_store::{ExecutionState, ExecutionStore, InMemoryStore};

pub const EXECUTION_ID: &str = "ex-1";

pub fn automation(value: Value) -> Automation {
  serde_json::from_value(value).expect("valid automation")
}

pub fn user_data(value: Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

pub fn start_time() -> DateTime<Utc> {
  "2024-05-01T12:00:00Z".parse().expect("valid timestamp")
}

struct Pending {
  due: DateTime<Utc>,
  job: ScheduledJob,
}

pub struct Harness {
  pub engine: Arc<Engine<ChannelSink>>,
  pub worker: Arc<Worker<ChannelSink>>,
  pub automation: Arc<Automation>,
  pub store: Arc<InMemoryStore>,
  pub clock: Arc<ManualClock>,
  jobs: mpsc::UnboundedReceiver<ScheduledJob>,
  events: mpsc::UnboundedReceiver<EngineEvent>,
  pending: Vec<Pending>,
  seen: Vec<EngineEvent>,
}

impl Harness {
  pub fn new(automation: Automation, registry: Registry) -> Self {
    Self::with_config(automation, registry, EngineConfig::default())
  }

  pub fn with_config(automation: Automation, registry: Registry, config: EngineConfig) -> Self {
    let (scheduler, jobs) = ChannelScheduler::new();
    let (sink, events) = ChannelSink::channel();
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));

    let engine = Arc::new(
      Engine::with_sink(Arc::new(registry), store.clone(), Arc::new(scheduler), sink)
        .with_config(config)
        .with_clock(clock.clone()),
    );
    let automation = Arc::new(automation);
    let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));

    Self {
      engine,
      worker,
      automation,
      store,
      clock,
      jobs,
      events,
      pending: Vec::new(),
      seen: Vec::new(),
    }
  }

  /// Start a per-node flow with id [`EXECUTION_ID`].
  pub async fn start(&mut self, data: Value) -> String {
    self
      .start_with(StartFlow {
        execution_id: Some(EXECUTION_ID.to_string()),
        user_data: user_data(data),
        trigger_id: None,
        mode: StartMode::PerNode,
      })
      .await
  }

  pub async fn start_with(&mut self, start: StartFlow) -> String {
    let id = self
      .engine
      .start_flow(&self.automation, start)
      .await
      .expect("flow starts");
    self.collect_jobs();
    id
  }

  /// Move newly scheduled jobs into the pending queue.
  pub fn collect_jobs(&mut self) {
    let now = self.clock.now();
    while let Ok(job) = self.jobs.try_recv() {
      let delay = i64::try_from(job.delay_ms().unwrap_or(0)).unwrap_or(i64::MAX);
      self.pending.push(Pending {
        due: now + Duration::milliseconds(delay),
        job,
      });
    }
  }

  /// Process one job directly, bypassing the pending queue.
  pub async fn process(&mut self, job: ScheduledJob) -> Result<JobOutcome, EngineError> {
    let outcome = self.worker.handle(job).await;
    self.collect_jobs();
    outcome
  }

  /// Process the oldest due job, if any.
  pub async fn step(&mut self) -> Option<Result<JobOutcome, EngineError>> {
    let now = self.clock.now();
    let index = self.pending.iter().position(|p| p.due <= now)?;
    let job = self.pending.remove(index).job;
    Some(self.process(job).await)
  }

  /// Process due jobs until none is left. Time does not move.
  pub async fn run_until_idle(&mut self) -> Vec<Result<JobOutcome, EngineError>> {
    let mut outcomes = Vec::new();
    while let Some(outcome) = self.step().await {
      outcomes.push(outcome);
    }
    outcomes
  }

  /// Process everything, jumping the clock to each next due job.
  pub async fn run_to_completion(&mut self) -> Vec<Result<JobOutcome, EngineError>> {
    let mut outcomes = Vec::new();
    loop {
      outcomes.extend(self.run_until_idle().await);
      let Some(next_due) = self.pending.iter().map(|p| p.due).min() else {
        return outcomes;
      };
      self.clock.set(next_due);
    }
  }

  pub fn advance(&self, ms: u64) {
    self.clock.advance(ms);
  }

  /// Remove and return every pending job, due or not.
  pub fn take_pending(&mut self) -> Vec<ScheduledJob> {
    self.pending.drain(..).map(|p| p.job).collect()
  }

  /// Pending node ids with their delays, in scheduling order.
  pub fn pending_nodes(&self) -> Vec<(String, Option<u64>)> {
    self
      .pending
      .iter()
      .filter_map(|p| match &p.job {
        ScheduledJob::Node(job) => Some((job.node_id.clone(), job.delay_ms)),
        ScheduledJob::Flow(_) => None,
      })
      .collect()
  }

  /// Every event emitted so far.
  pub fn events(&mut self) -> &[EngineEvent] {
    while let Ok(event) = self.events.try_recv() {
      self.seen.push(event);
    }
    &self.seen
  }

  /// Event names with their node ids, e.g. `nodeCompleted:end`.
  pub fn trace(&mut self) -> Vec<String> {
    self
      .events()
      .iter()
      .map(|event| match event.node_id() {
        Some(node_id) => format!("{}:{}", event.name(), node_id),
        None => event.name().to_string(),
      })
      .collect()
  }

  pub fn count(&mut self, name: &str, node_id: Option<&str>) -> usize {
    self
      .events()
      .iter()
      .filter(|e| e.name() == name && (node_id.is_none() || e.node_id() == node_id))
      .count()
  }

  pub async fn state(&self) -> ExecutionState {
    self
      .store
      .load(EXECUTION_ID)
      .await
      .expect("store load")
      .expect("execution exists")
  }
}
