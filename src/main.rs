use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use waypoint_config::{ActionResult, Automation};
use waypoint_engine::{Engine, EngineConfig, EngineEvent, InlineScheduler, StartFlow, StartMode, Worker};
use waypoint_registry::{ActionKind, FnAction, Registry, RuntimeContext};
use waypoint_store::{ExecutionStore, InMemoryStore};
use waypoint_workflow::Indices;

/// Waypoint - a graph workflow engine
#[derive(Parser)]
#[command(name = "waypoint")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run an automation to completion in this process.
  ///
  /// User data is read as a JSON object from stdin when piped. Engine events
  /// are printed as JSON lines, followed by the final execution state.
  Run {
    /// Path to the automation file (JSON)
    automation_file: PathBuf,

    /// Execution id (default: random UUID)
    #[arg(long)]
    execution_id: Option<String>,

    /// Persist every event into the execution history
    #[arg(long)]
    history: bool,

    /// Start with a single flow job instead of a root node job
    #[arg(long)]
    per_flow: bool,
  },

  /// Print the graph's nodes with their resolved edges
  Graph {
    /// Path to the automation file (JSON)
    automation_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      automation_file,
      execution_id,
      history,
      per_flow,
    }) => {
      let mode = if per_flow {
        StartMode::PerFlow
      } else {
        StartMode::PerNode
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_automation(automation_file, execution_id, history, mode))?;
    }
    Some(Commands::Graph { automation_file }) => {
      print_graph(&automation_file)?;
    }
    None => {
      println!("waypoint - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_automation(path: &Path) -> Result<Automation> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read automation file: {}", path.display()))?;
  let automation: Automation = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse automation file: {}", path.display()))?;

  if automation.get_node(&automation.root_node_id).is_none() {
    bail!(
      "root node '{}' is not part of the graph",
      automation.root_node_id
    );
  }
  Ok(automation)
}

async fn run_automation(
  automation_file: PathBuf,
  execution_id: Option<String>,
  history: bool,
  mode: StartMode,
) -> Result<()> {
  let automation = Arc::new(load_automation(&automation_file)?);
  let user_data = read_user_data_from_stdin()?;
  info!(automation_id = %automation.meta.id, "automation loaded");

  let registry = demo_registry().context("failed to build action registry")?;
  let store = Arc::new(InMemoryStore::new());
  let scheduler = Arc::new(InlineScheduler::new());

  let sink = |event: EngineEvent| match serde_json::to_string(&event) {
    Ok(line) => println!("{line}"),
    Err(err) => tracing::warn!(error = %err, "failed to serialize event"),
  };
  let engine = Arc::new(
    Engine::with_sink(Arc::new(registry), store.clone(), scheduler.clone(), sink).with_config(
      EngineConfig {
        enable_history: history,
      },
    ),
  );
  let worker = Arc::new(Worker::new(engine.clone(), automation.clone()));
  scheduler
    .bind(&worker)
    .context("failed to bind scheduler")?;

  let execution_id = engine
    .start_flow(
      &automation,
      StartFlow {
        execution_id,
        user_data,
        trigger_id: None,
        mode,
      },
    )
    .await
    .context("failed to start flow")?;

  let state = store
    .load(&execution_id)
    .await
    .context("failed to load execution state")?
    .with_context(|| format!("execution '{execution_id}' disappeared"))?;

  eprintln!("Execution finished: {execution_id}");
  println!("{}", serde_json::to_string_pretty(&state)?);

  Ok(())
}

/// Core comparators plus two demo actions: `log` echoes its params, `noop`
/// does nothing. Unregistered kinds complete without a result.
fn demo_registry() -> Result<Registry> {
  let log = FnAction::new(|params: Map<String, Value>, ctx: RuntimeContext| async move {
    info!(
      node_id = ctx.exec.current_node_id.as_deref().unwrap_or("-"),
      params = %serde_json::Value::Object(params.clone()),
      "log action"
    );
    Ok(ActionResult::ok_with(Value::Object(params)))
  });

  let registry = Registry::core_builder()
    .action(ActionKind::new("log").with_executor(log))
    .action(ActionKind::new("noop"))
    .build()?;
  Ok(registry)
}

fn print_graph(path: &Path) -> Result<()> {
  let automation = load_automation(path)?;
  let indices = Indices::build(&automation.graph);

  println!(
    "{} ({}), root: {}",
    automation.meta.name, automation.meta.id, automation.root_node_id
  );
  for node in &automation.graph.nodes {
    let targets: Vec<String> = indices
      .outgoing(&node.id)
      .iter()
      .map(|target| match indices.node(target) {
        Some(_) => target.to_string(),
        None => format!("{target} (missing)"),
      })
      .collect();
    println!(
      "  {:<16} {:<9} in={} out={} -> [{}]",
      node.id,
      node.node_type().to_string(),
      indices.in_degree(&node.id),
      indices.out_degree(&node.id),
      targets.join(", ")
    );
  }
  for trigger in &automation.triggers {
    println!("  trigger {} on '{}'", trigger.id, trigger.event);
  }

  Ok(())
}

fn read_user_data_from_stdin() -> Result<Map<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read user data from stdin")?;

  if input.trim().is_empty() {
    return Ok(Map::new());
  }
  let value: Value =
    serde_json::from_str(&input).context("failed to parse user data JSON from stdin")?;
  match value {
    Value::Object(map) => Ok(map),
    other => bail!("user data must be a JSON object, got: {other}"),
  }
}
