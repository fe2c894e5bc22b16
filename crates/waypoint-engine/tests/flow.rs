mod common;

use common::{EXECUTION_ID, Harness, automation};
use serde_json::{Map, Value, json};
use waypoint_config::ActionResult;
use waypoint_engine::{
  EngineConfig, EngineError, EngineEvent, JobHandler, JobOutcome, NodeJob, ScheduledJob, StartFlow,
  StartMode,
};
use waypoint_registry::{ActionKind, FnAction, Registry, RuntimeContext};
use waypoint_store::ExecutionStore;

fn linear() -> waypoint_config::Automation {
  automation(json!({
    "meta": { "id": "welcome", "name": "Welcome" },
    "rootNodeId": "greet",
    "graph": {
      "nodes": [
        { "id": "greet", "type": "action", "action": { "kind": "greet", "params": { "greeting": "hi" } } },
        { "id": "done", "type": "end" }
      ],
      "edges": [{ "id": "e1", "from": "greet", "to": "done" }]
    }
  }))
}

fn greet_registry() -> Registry {
  Registry::core_builder()
    .action(ActionKind::new("greet").with_executor(FnAction::new(|params: Map<String, Value>, ctx: RuntimeContext| async move {
      Ok(ActionResult::ok_with(json!({
        "greeting": params.get("greeting").cloned(),
        "name": ctx.user.data.get("name").cloned(),
        "automation": ctx.flow.automation_id,
      })))
    })))
    .build_lenient()
}

#[tokio::test]
async fn test_linear_flow_completes() {
  let mut h = Harness::new(linear(), greet_registry());
  let id = h.start(json!({ "name": "Ada" })).await;
  assert_eq!(id, EXECUTION_ID);

  let outcomes = h.run_until_idle().await;
  assert_eq!(outcomes.len(), 2);

  assert_eq!(
    h.trace(),
    vec![
      "flowStarted",
      "nodeScheduled:greet",
      "nodeCompleted:greet",
      "nodeScheduled:done",
      "nodeCompleted:done",
      "flowCompleted",
    ]
  );

  let state = h.state().await;
  assert_eq!(
    state.exec.node_results["greet"],
    json!({ "status": "ok", "data": { "greeting": "hi", "name": "Ada", "automation": "welcome" } })
  );
  assert_eq!(state.last_node_id.as_deref(), Some("done"));
  assert_eq!(state.current_node_id, None);
  assert!(state.history.is_empty());
}

#[tokio::test]
async fn test_node_completed_carries_result() {
  let mut h = Harness::new(linear(), greet_registry());
  h.start(json!({})).await;
  h.run_until_idle().await;

  let completed = h
    .events()
    .iter()
    .find_map(|e| match e {
      EngineEvent::NodeCompleted {
        node_id, result, ..
      } if node_id == "greet" => result.clone(),
      _ => None,
    })
    .unwrap();
  assert_eq!(completed.data.unwrap()["greeting"], json!("hi"));
}

#[tokio::test]
async fn test_generated_execution_id() {
  let mut h = Harness::new(linear(), greet_registry());
  let id = h.start_with(StartFlow::default()).await;
  assert!(uuid_like(&id), "{id}");
  assert!(h.store.load(&id).await.unwrap().is_some());
}

fn uuid_like(id: &str) -> bool {
  id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_per_flow_start_runs_root() {
  let mut h = Harness::new(linear(), greet_registry());
  h.start_with(StartFlow {
    execution_id: Some(EXECUTION_ID.to_string()),
    trigger_id: Some("manual".to_string()),
    mode: StartMode::PerFlow,
    ..StartFlow::default()
  })
  .await;

  let pending = h.take_pending();
  assert!(matches!(pending.as_slice(), [ScheduledJob::Flow(_)]));
  let outcome = h.process(pending[0].clone()).await.unwrap();
  assert_eq!(
    outcome,
    JobOutcome::Completed {
      next: vec!["done".to_string()],
      flow_completed: false,
    }
  );
  h.run_until_idle().await;
  assert_eq!(h.count("flowCompleted", None), 1);
  assert_eq!(h.state().await.trigger_id.as_deref(), Some("manual"));
}

#[tokio::test]
async fn test_action_without_edges_completes_flow() {
  let automation = automation(json!({
    "meta": { "id": "solo", "name": "Solo" },
    "rootNodeId": "only",
    "graph": { "nodes": [{ "id": "only", "type": "action", "action": { "kind": "greet" } }] }
  }));
  let mut h = Harness::new(automation, greet_registry());
  h.start(json!({})).await;
  h.run_until_idle().await;

  assert_eq!(h.count("nodeCompleted", Some("only")), 1);
  assert_eq!(h.count("flowCompleted", None), 1);
}

#[tokio::test]
async fn test_history_records_every_event() {
  let mut h = Harness::with_config(
    linear(),
    greet_registry(),
    EngineConfig {
      enable_history: true,
    },
  );
  h.start(json!({})).await;
  h.run_until_idle().await;

  let state = h.state().await;
  let recorded: Vec<&str> = state.history.iter().map(|e| e.event.name()).collect();
  assert_eq!(
    recorded,
    vec![
      "flowStarted",
      "nodeScheduled",
      "nodeCompleted",
      "nodeScheduled",
      "nodeCompleted",
      "flowCompleted",
    ]
  );
  let emitted: Vec<EngineEvent> = h.events().to_vec();
  let persisted: Vec<EngineEvent> = state.history.into_iter().map(|e| e.event).collect();
  assert_eq!(persisted, emitted);
}

#[tokio::test]
async fn test_unknown_node_is_fatal_without_mutation() {
  let mut h = Harness::new(linear(), greet_registry());
  h.start(json!({})).await;
  h.take_pending();
  let before = h.state().await;

  let err = h
    .process(ScheduledJob::Node(NodeJob::new(EXECUTION_ID, "ghost")))
    .await
    .unwrap_err();

  assert!(matches!(&err, EngineError::NodeNotFound { node_id } if node_id == "ghost"));
  assert_eq!(h.state().await, before);
  assert_eq!(h.count("nodeScheduled", Some("ghost")), 0);
  assert!(h.events().iter().any(|e| matches!(
    e,
    EngineEvent::NodeErrored { node_id, error, .. }
      if node_id == "ghost" && error.code.as_deref() == Some("NODE_NOT_FOUND")
  )));
}

#[tokio::test]
async fn test_job_without_started_flow_creates_state() {
  let mut h = Harness::new(linear(), greet_registry());
  h.process(ScheduledJob::Node(NodeJob::new(EXECUTION_ID, "greet")))
    .await
    .unwrap();

  let state = h.state().await;
  assert_eq!(state.automation_id, "welcome");
  assert_eq!(state.last_node_id.as_deref(), Some("greet"));
  assert_eq!(h.pending_nodes(), vec![("done".to_string(), None)]);
}

#[tokio::test]
async fn test_conditional_edges_fan_out() {
  let automation = automation(json!({
    "meta": { "id": "edges", "name": "Edges" },
    "rootNodeId": "a",
    "graph": {
      "nodes": [
        { "id": "a", "type": "action", "action": { "kind": "noop" } },
        { "id": "vip", "type": "end" },
        { "id": "big", "type": "end" },
        { "id": "small", "type": "end" }
      ],
      "edges": [
        { "id": "e-vip", "from": "a", "to": "vip", "condition": { "root": {
          "type": "condition", "comparator": "EQ",
          "left": { "kind": "var", "path": "tier" }, "right": { "kind": "const", "value": "vip" } } } },
        { "id": "e-big", "from": "a", "to": "big", "condition": { "root": {
          "type": "condition", "comparator": "GT",
          "left": { "kind": "var", "path": "amount" }, "right": { "kind": "const", "value": 100 } } } },
        { "id": "e-small", "from": "a", "to": "small", "condition": { "root": {
          "type": "condition", "comparator": "LT",
          "left": { "kind": "var", "path": "amount" }, "right": { "kind": "const", "value": 100 } } } }
      ]
    }
  }));
  let mut h = Harness::new(automation, Registry::core());
  h.start(json!({ "tier": "vip", "amount": 250 })).await;
  h.step().await.unwrap().unwrap();

  assert_eq!(
    h.pending_nodes(),
    vec![("vip".to_string(), None), ("big".to_string(), None)]
  );
  assert!(h.events().iter().any(|e| matches!(
    e,
    EngineEvent::EdgeMultiMatch { matched_edge_ids, .. }
      if matched_edge_ids == &["e-vip".to_string(), "e-big".to_string()]
  )));
}

// Known inconsistency, kept on purpose: an unresolved comparator evaluates to
// false and the flow moves on, while an unresolved fn operand fails the job.
#[tokio::test]
async fn test_unresolved_comparator_and_fn_operand_are_asymmetric() {
  let automation = automation(json!({
    "meta": { "id": "asym", "name": "Asymmetric" },
    "rootNodeId": "by_comparator",
    "graph": {
      "nodes": [
        { "id": "by_comparator", "type": "decision",
          "branches": [{ "id": "b1", "to": "never", "condition": { "root": {
            "type": "condition", "comparator": "MATCHES",
            "left": { "kind": "const", "value": 1 } } } }],
          "defaultTo": "by_fn" },
        { "id": "by_fn", "type": "decision",
          "branches": [{ "id": "b1", "to": "never", "condition": { "root": {
            "type": "condition", "comparator": "EXISTS",
            "left": { "kind": "fn", "fnId": "lookup" } } } }],
          "defaultTo": "never" },
        { "id": "never", "type": "end" }
      ]
    }
  }));
  let mut h = Harness::with_config(
    automation,
    Registry::core(),
    EngineConfig {
      enable_history: true,
    },
  );
  h.start(json!({})).await;

  let outcomes = h.run_until_idle().await;
  assert_eq!(outcomes.len(), 2);
  assert!(outcomes[0].is_ok());
  let err = outcomes[1].as_ref().unwrap_err();
  assert_eq!(err.code(), "UNRESOLVED_FUNCTION_OPERAND");

  assert_eq!(h.count("nodeCompleted", Some("by_comparator")), 1);
  assert_eq!(h.count("nodeErrored", Some("by_fn")), 1);
  assert_eq!(h.count("nodeCompleted", Some("by_fn")), 0);
  assert_eq!(h.count("flowCompleted", None), 0);

  let state = h.state().await;
  let last_error = state.last_error.unwrap();
  assert_eq!(last_error.node_id, "by_fn");
  assert!(last_error.message.contains("lookup"));
  assert_eq!(
    state.history.last().map(|e| e.event.name()),
    Some("nodeErrored")
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_jobs_share_one_state() {
  let mut h = Harness::with_config(
    linear(),
    greet_registry(),
    EngineConfig {
      enable_history: true,
    },
  );

  for run in 0..20 {
    let execution_id = format!("fresh-{run}");
    let tasks: Vec<_> = ["greet", "done"]
      .into_iter()
      .map(|node_id| {
        let worker = std::sync::Arc::clone(&h.worker);
        let job = ScheduledJob::Node(NodeJob::new(&execution_id, node_id));
        tokio::spawn(async move { worker.handle(job).await })
      })
      .collect();
    for task in tasks {
      task.await.unwrap().unwrap();
    }

    let state = h.store.load(&execution_id).await.unwrap().unwrap();
    let completed: Vec<Option<&str>> = state
      .history
      .iter()
      .filter(|e| e.event.name() == "nodeCompleted")
      .map(|e| e.event.node_id())
      .collect();
    assert_eq!(completed.len(), 2, "{execution_id}: {completed:?}");
    assert!(state.exec.node_results.contains_key("greet"));
  }
  h.collect_jobs();
}
