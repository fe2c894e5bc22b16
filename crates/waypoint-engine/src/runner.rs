//! Workers and the channel-driven job runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use waypoint_config::Automation;

use crate::engine::{Engine, JobOutcome};
use crate::error::EngineError;
use crate::events::{EventSink, NoopSink};
use crate::scheduler::{JobHandler, ScheduledJob};

/// Binds an engine to one automation so delivered jobs can be processed.
pub struct Worker<N: EventSink = NoopSink> {
  engine: Arc<Engine<N>>,
  automation: Arc<Automation>,
}

impl<N: EventSink> Worker<N> {
  pub fn new(engine: Arc<Engine<N>>, automation: Arc<Automation>) -> Self {
    Self { engine, automation }
  }

  pub fn engine(&self) -> &Arc<Engine<N>> {
    &self.engine
  }

  pub fn automation(&self) -> &Automation {
    &self.automation
  }
}

#[async_trait]
impl<N: EventSink + 'static> JobHandler for Worker<N> {
  async fn handle(&self, job: ScheduledJob) -> Result<JobOutcome, EngineError> {
    match job {
      ScheduledJob::Node(job) => self.engine.handle_node_job(&self.automation, &job).await,
      ScheduledJob::Flow(job) => self.engine.handle_flow_job(&self.automation, &job).await,
    }
  }
}

/// Consumes jobs from a [`ChannelScheduler`](crate::ChannelScheduler) and
/// processes each one on its own task once its delay has elapsed.
///
/// # Usage
///
/// ```ignore
/// let (scheduler, jobs) = ChannelScheduler::new();
/// let engine = Arc::new(Engine::new(registry, store, Arc::new(scheduler)));
/// let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));
///
/// let cancel = CancellationToken::new();
/// tokio::spawn(JobRunner::new(jobs, worker).start(cancel.clone()));
/// engine.start_flow(&automation, StartFlow::default()).await?;
/// ```
pub struct JobRunner {
  receiver: mpsc::UnboundedReceiver<ScheduledJob>,
  handler: Arc<dyn JobHandler>,
}

impl JobRunner {
  pub fn new(receiver: mpsc::UnboundedReceiver<ScheduledJob>, handler: Arc<dyn JobHandler>) -> Self {
    Self { receiver, handler }
  }

  /// Run until the token is cancelled or the channel closes.
  ///
  /// On cancellation in-flight jobs are aborted; when the channel closes they
  /// are allowed to finish.
  pub async fn start(mut self, cancel: CancellationToken) {
    info!("starting job runner");
    let mut tasks = JoinSet::new();

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!(in_flight = tasks.len(), "job runner cancelled");
          tasks.shutdown().await;
          return;
        }
        job = self.receiver.recv() => {
          match job {
            Some(job) => {
              let handler = self.handler.clone();
              tasks.spawn(run_job(handler, job));
            }
            None => {
              info!("job runner channel closed");
              break;
            }
          }
        }
        Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
          if let Err(err) = joined {
            error!(error = %err, "job task failed to complete");
          }
        }
      }
    }

    while let Some(joined) = tasks.join_next().await {
      if let Err(err) = joined {
        error!(error = %err, "job task failed to complete");
      }
    }
  }
}

async fn run_job(handler: Arc<dyn JobHandler>, job: ScheduledJob) {
  if let Some(delay) = job.delay_ms().filter(|d| *d > 0) {
    tokio::time::sleep(Duration::from_millis(delay)).await;
  }
  let execution_id = job.execution_id().to_string();
  match handler.handle(job).await {
    Ok(outcome) => {
      tracing::debug!(execution_id = %execution_id, outcome = ?outcome, "job processed");
    }
    Err(err) => {
      error!(
        execution_id = %execution_id,
        code = err.code(),
        error = %err.detail(),
        "job failed"
      );
    }
  }
}
