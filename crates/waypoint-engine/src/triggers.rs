//! Helpers that start flows in response to host events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use waypoint_config::{Automation, ConditionNode, Trigger};
use waypoint_registry::{ExecContext, FlowContext, RuntimeContext, UserContext};

use crate::conditions::evaluate_condition;
use crate::engine::{Engine, StartFlow, StartMode};
use crate::error::EngineError;
use crate::events::EventSink;

type ExecutionIdFn<E> = Box<dyn Fn(&E) -> String + Send + Sync>;
type UserDataFn<E> = Box<dyn Fn(&E) -> Map<String, Value> + Send + Sync>;

/// Result of handing an event to a [`TriggerHelper`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
  pub started: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub execution_id: Option<String>,
}

/// Binds a host event type `E` to flow starts.
///
/// The optional filter is evaluated against a context whose `user.data` is
/// mapped from the event and whose `flow.triggerId` is this helper's id.
/// Listening for events is up to the host.
pub struct TriggerHelper<E> {
  id: String,
  event: String,
  filter: Option<ConditionNode>,
  make_execution_id: ExecutionIdFn<E>,
  map_user_data: Option<UserDataFn<E>>,
  mode: StartMode,
}

impl<E> TriggerHelper<E> {
  pub fn new(
    id: impl Into<String>,
    event: impl Into<String>,
    make_execution_id: impl Fn(&E) -> String + Send + Sync + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      event: event.into(),
      filter: None,
      make_execution_id: Box::new(make_execution_id),
      map_user_data: None,
      mode: StartMode::default(),
    }
  }

  /// A helper for a trigger declared in an automation, including its filter.
  pub fn from_trigger(
    trigger: &Trigger,
    make_execution_id: impl Fn(&E) -> String + Send + Sync + 'static,
  ) -> Self {
    let mut helper = Self::new(&trigger.id, &trigger.event, make_execution_id);
    helper.filter = trigger.filter.clone();
    helper
  }

  pub fn with_filter(mut self, filter: ConditionNode) -> Self {
    self.filter = Some(filter);
    self
  }

  pub fn with_user_data(
    mut self,
    map: impl Fn(&E) -> Map<String, Value> + Send + Sync + 'static,
  ) -> Self {
    self.map_user_data = Some(Box::new(map));
    self
  }

  pub fn with_mode(mut self, mode: StartMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Event name this helper handles.
  pub fn event(&self) -> &str {
    &self.event
  }

  /// Evaluate the filter and, if it passes, start a flow of `automation`.
  pub async fn handle<N: EventSink>(
    &self,
    event: &E,
    engine: &Engine<N>,
    automation: &Automation,
  ) -> Result<TriggerOutcome, EngineError> {
    let user_data = self
      .map_user_data
      .as_ref()
      .map(|map| map(event))
      .unwrap_or_default();

    let ctx = RuntimeContext {
      flow: FlowContext {
        automation_id: automation.meta.id.clone(),
        root_node_id: automation.root_node_id.clone(),
        trigger_id: Some(self.id.clone()),
        started_at: Some(engine.clock().now().to_rfc3339()),
      },
      exec: ExecContext::default(),
      user: UserContext {
        data: user_data.clone(),
      },
    };

    if !evaluate_condition(self.filter.as_ref(), &ctx, engine.registry()).await? {
      debug!(trigger_id = %self.id, event = %self.event, "trigger filter rejected event");
      return Ok(TriggerOutcome {
        started: false,
        execution_id: None,
      });
    }

    let execution_id = engine
      .start_flow(
        automation,
        StartFlow {
          execution_id: Some((self.make_execution_id)(event)),
          user_data,
          trigger_id: Some(self.id.clone()),
          mode: self.mode,
        },
      )
      .await?;

    Ok(TriggerOutcome {
      started: true,
      execution_id: Some(execution_id),
    })
  }
}

impl<E> std::fmt::Debug for TriggerHelper<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TriggerHelper")
      .field("id", &self.id)
      .field("event", &self.event)
      .field("filter", &self.filter)
      .field("mode", &self.mode)
      .finish_non_exhaustive()
  }
}
