//! Waypoint Engine
//!
//! This crate drives automations one node job at a time. A host starts a flow,
//! then delivers every scheduled job back to [`Engine::handle_node_job`],
//! from whatever queue or runtime it uses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SchedulerAdapter / JobRunner               │
//! │  - turns continuations into (delayed) job deliveries        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - handle_node_job(automation, job) → JobOutcome            │
//! │  - node transitions, join bookkeeping, retry/backoff        │
//! │  - one atomic ExecutionStore::update per job                │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Registry / EventSink / Clock                │
//! │  - actions, comparators, operand resolvers                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use waypoint_engine::{Engine, InlineScheduler, StartFlow, Worker};
//!
//! let scheduler = Arc::new(InlineScheduler::new());
//! let engine = Arc::new(Engine::new(registry, store, scheduler.clone()));
//! let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));
//! scheduler.bind(&worker)?;
//!
//! let execution_id = engine.start_flow(&automation, StartFlow::default()).await?;
//! ```

mod clock;
mod conditions;
mod config;
mod engine;
mod error;
mod events;
mod join;
mod nodes;
mod operands;
mod retry;
mod runner;
mod scheduler;
mod triggers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conditions::{evaluate_condition, evaluate_node};
pub use config::EngineConfig;
pub use engine::{Engine, JobOutcome, StartFlow, StartMode};
pub use error::EngineError;
pub use events::{ChannelSink, EngineEvent, EventSink, NodeErrorInfo, NoopSink};
pub use operands::resolve_operand;
pub use runner::{JobRunner, Worker};
pub use scheduler::{
  ChannelScheduler, FlowJob, InlineScheduler, JobHandler, NodeJob, ScheduledJob, SchedulerAdapter,
  SchedulerError,
};
pub use triggers::{TriggerHelper, TriggerOutcome};
