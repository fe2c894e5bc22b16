mod common;

use std::sync::Arc;
use std::time::Duration;

use common::automation;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use waypoint_config::{ActionResult, Automation};
use waypoint_engine::{
  ChannelScheduler, ChannelSink, Engine, EngineEvent, InlineScheduler, JobRunner, StartFlow,
  StartMode, TriggerHelper, Worker,
};
use waypoint_registry::{ActionKind, FnAction, Registry, RuntimeContext};
use waypoint_store::{ExecutionStore, InMemoryStore};

fn onboarding() -> Automation {
  automation(json!({
    "meta": { "id": "onboarding", "name": "Onboarding" },
    "rootNodeId": "welcome",
    "triggers": [{
      "id": "signup-pro",
      "event": "user.created",
      "filter": {
        "type": "group", "op": "AND", "children": [
          { "type": "condition", "comparator": "EQ",
            "left": { "kind": "var", "path": "plan" }, "right": { "kind": "const", "value": "pro" } },
          { "type": "condition", "comparator": "EQ",
            "left": { "kind": "var", "path": "flow.triggerId" },
            "right": { "kind": "const", "value": "signup-pro" } }
        ]
      }
    }],
    "graph": {
      "nodes": [
        { "id": "welcome", "type": "action", "action": { "kind": "email", "params": { "template": "welcome" } } },
        { "id": "pause", "type": "wait", "wait": { "kind": "duration", "durationMs": 60000 }, "to": "tips" },
        { "id": "tips", "type": "parallel",
          "branches": [{ "id": "t1", "start": "tip_a" }, { "id": "t2", "start": "tip_b" }],
          "to": "done" },
        { "id": "tip_a", "type": "action", "action": { "kind": "email", "params": { "template": "tip-a" } } },
        { "id": "tip_b", "type": "action", "action": { "kind": "email", "params": { "template": "tip-b" } } },
        { "id": "done", "type": "end" }
      ],
      "edges": [{ "id": "e1", "from": "welcome", "to": "pause" }]
    }
  }))
}

fn registry() -> Registry {
  Registry::core_builder()
    .action(ActionKind::new("email").with_executor(FnAction::new(
      |params: Map<String, Value>, ctx: RuntimeContext| async move {
        Ok(ActionResult::ok_with(json!({
          "template": params.get("template").cloned(),
          "to": ctx.user.data.get("email").cloned(),
        })))
      },
    )))
    .build_lenient()
}

async fn wait_for_completion(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
  let mut seen = Vec::new();
  while let Some(event) = events.recv().await {
    let done = matches!(event, EngineEvent::FlowCompleted { .. });
    seen.push(event);
    if done {
      break;
    }
  }
  seen
}

#[tokio::test(start_paused = true)]
async fn test_inline_scheduler_runs_flow_to_completion() {
  let scheduler = Arc::new(InlineScheduler::new());
  let store = Arc::new(InMemoryStore::new());
  let (sink, mut events) = ChannelSink::channel();
  let engine = Arc::new(Engine::with_sink(
    Arc::new(registry()),
    store.clone(),
    scheduler.clone(),
    sink,
  ));
  let automation = Arc::new(onboarding());
  let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));
  scheduler.bind(&worker).unwrap();

  let started = tokio::time::Instant::now();
  let id = engine
    .start_flow(
      &automation,
      StartFlow {
        user_data: common::user_data(json!({ "email": "ada@example.com" })),
        ..StartFlow::default()
      },
    )
    .await
    .unwrap();

  assert!(started.elapsed() >= Duration::from_secs(60));
  let seen = wait_for_completion(&mut events).await;
  assert_eq!(seen.iter().filter(|e| e.name() == "flowCompleted").count(), 1);

  let state = store.load(&id).await.unwrap().unwrap();
  assert_eq!(state.exec.node_results.len(), 3);
  assert_eq!(
    state.exec.node_results["tip_b"]["data"],
    json!({ "template": "tip-b", "to": "ada@example.com" })
  );
  assert!(state.control.parallel["tips"].fired);
}

#[tokio::test]
async fn test_inline_scheduler_binds_once() {
  let scheduler = Arc::new(InlineScheduler::new());
  let engine = Arc::new(Engine::new(
    Arc::new(Registry::core()),
    Arc::new(InMemoryStore::new()),
    scheduler.clone(),
  ));
  let worker = Arc::new(Worker::new(engine, Arc::new(onboarding())));

  scheduler.bind(&worker).unwrap();
  assert!(scheduler.bind(&worker).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_job_runner_processes_channel_jobs() {
  let (scheduler, jobs) = ChannelScheduler::new();
  let store = Arc::new(InMemoryStore::new());
  let (sink, mut events) = ChannelSink::channel();
  let engine = Arc::new(Engine::with_sink(
    Arc::new(registry()),
    store.clone(),
    Arc::new(scheduler),
    sink,
  ));
  let automation = Arc::new(onboarding());
  let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));

  let cancel = CancellationToken::new();
  let runner = tokio::spawn(JobRunner::new(jobs, worker).start(cancel.clone()));

  let id = engine
    .start_flow(
      &automation,
      StartFlow {
        execution_id: Some("run-1".to_string()),
        mode: StartMode::PerFlow,
        ..StartFlow::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(id, "run-1");

  let seen = wait_for_completion(&mut events).await;
  let completed: Vec<&str> = seen
    .iter()
    .filter(|e| e.name() == "nodeCompleted")
    .filter_map(EngineEvent::node_id)
    .collect();
  assert_eq!(completed.len(), 6);
  assert_eq!(completed.last(), Some(&"done"));

  cancel.cancel();
  runner.await.unwrap();
  assert_eq!(store.load("run-1").await.unwrap().unwrap().last_node_id.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_job_runner_stops_on_cancel_with_delayed_jobs() {
  let (scheduler, jobs) = ChannelScheduler::new();
  let engine = Arc::new(Engine::new(
    Arc::new(registry()),
    Arc::new(InMemoryStore::new()),
    Arc::new(scheduler),
  ));
  let automation = Arc::new(onboarding());
  let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));

  let cancel = CancellationToken::new();
  let runner = tokio::spawn(JobRunner::new(jobs, worker).start(cancel.clone()));
  engine
    .start_flow(&automation, StartFlow::default())
    .await
    .unwrap();

  cancel.cancel();
  tokio::time::timeout(Duration::from_secs(5), runner)
    .await
    .expect("runner stops promptly")
    .unwrap();
}

#[derive(Debug)]
struct Signup {
  user_id: u64,
  email: &'static str,
  plan: &'static str,
}

fn signup_helper(automation: &Automation) -> TriggerHelper<Signup> {
  let trigger = automation.triggers_for("user.created").next().unwrap();
  TriggerHelper::from_trigger(trigger, |e: &Signup| format!("signup-{}", e.user_id)).with_user_data(
    |e: &Signup| {
      let mut data = Map::new();
      data.insert("email".to_string(), json!(e.email));
      data.insert("plan".to_string(), json!(e.plan));
      data
    },
  )
}

#[tokio::test]
async fn test_trigger_helper_filters_and_starts() {
  let (scheduler, mut jobs) = ChannelScheduler::new();
  let store = Arc::new(InMemoryStore::new());
  let engine = Engine::new(Arc::new(registry()), store.clone(), Arc::new(scheduler));
  let automation = onboarding();
  let helper = signup_helper(&automation);
  assert_eq!(helper.id(), "signup-pro");
  assert_eq!(helper.event(), "user.created");

  let free = Signup {
    user_id: 1,
    email: "free@example.com",
    plan: "free",
  };
  let outcome = helper.handle(&free, &engine, &automation).await.unwrap();
  assert!(!outcome.started);
  assert!(store.is_empty().await);
  assert!(jobs.try_recv().is_err());

  let pro = Signup {
    user_id: 2,
    email: "pro@example.com",
    plan: "pro",
  };
  let outcome = helper.handle(&pro, &engine, &automation).await.unwrap();
  assert!(outcome.started);
  assert_eq!(outcome.execution_id.as_deref(), Some("signup-2"));

  let state = store.load("signup-2").await.unwrap().unwrap();
  assert_eq!(state.trigger_id.as_deref(), Some("signup-pro"));
  assert_eq!(state.user["email"], json!("pro@example.com"));
  assert!(jobs.try_recv().is_ok());
}

#[tokio::test]
async fn test_trigger_helper_without_filter_always_starts() {
  let (scheduler, _jobs) = ChannelScheduler::new();
  let engine = Engine::new(
    Arc::new(registry()),
    Arc::new(InMemoryStore::new()),
    Arc::new(scheduler),
  );
  let helper = TriggerHelper::new("manual", "manual.run", |n: &u32| format!("manual-{n}"))
    .with_mode(StartMode::PerFlow);

  let outcome = helper.handle(&7, &engine, &onboarding()).await.unwrap();
  assert_eq!(outcome.execution_id.as_deref(), Some("manual-7"));
}
