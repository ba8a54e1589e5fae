use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pipecore::{ExecutionEvent, Flow, Node, NodeEvent, RunOutcome};
use piperuntime::{validate_flow, FlowRuntime, InstructionRegistry, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipeflow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Runtime configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for stored flows and run history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow file
    Run {
        /// Path to flow JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate a flow file
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List available instructions
    Instructions,

    /// Create a new example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },

    /// Show recorded runs, newest first
    History {
        /// Only runs of this flow
        #[arg(long)]
        flow: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn registry() -> InstructionRegistry {
    let mut registry = InstructionRegistry::new();
    pipetasks::register_all(&mut registry);
    registry
}

async fn runtime(config: Option<&Path>, data_dir: Option<PathBuf>) -> Result<FlowRuntime> {
    let mut config = match config {
        Some(path) => RuntimeConfig::load(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    tracing::debug!("Runtime data dir: {:?}", config.data_dir);
    Ok(FlowRuntime::with_registry(Arc::new(registry()), config))
}

fn load_flow(file: &Path) -> Result<Flow> {
    let flow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading flow file {}", file.display()))?;
    let flow: Flow = serde_json::from_str(&flow_json)
        .with_context(|| format!("parsing flow file {}", file.display()))?;
    tracing::debug!("Loaded flow {} with {} nodes", flow.id, flow.nodes.len());
    Ok(flow)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { file } => {
            let runtime = runtime(cli.config.as_deref(), cli.data_dir).await?;
            run_flow(&runtime, &file).await?;
        }

        Commands::Validate { file } => {
            check_flow(&file)?;
        }

        Commands::Instructions => {
            list_instructions();
        }

        Commands::Init { output } => {
            create_example_flow(&output)?;
        }

        Commands::History { flow } => {
            let runtime = runtime(cli.config.as_deref(), cli.data_dir).await?;
            show_history(&runtime, flow.as_deref()).await?;
        }
    }

    Ok(())
}

async fn run_flow(runtime: &FlowRuntime, file: &Path) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());

    let flow = load_flow(file)?;

    println!("📋 Flow: {}", flow.name);
    println!("   Nodes: {}", flow.nodes.len());
    println!("   Edges: {}", flow.edges.len());
    println!();

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::FlowStarted { start_node, .. } => {
                    println!("▶️  Flow started at {}", start_node);
                }
                ExecutionEvent::NodeStarted {
                    node_id,
                    instruction_id,
                    ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, instruction_id);
                }
                ExecutionEvent::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::EdgeTaken {
                    source,
                    target,
                    guard,
                    ..
                } => match guard {
                    Some(guard) => println!("  ➡️  {} -> {} [{}]", source, target, guard),
                    None => println!("  ➡️  {} -> {}", source, target),
                },
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Progress { percent, message } => match message {
                        Some(msg) => println!("     📊 [{}] {}% - {}", node_id, percent, msg),
                        None => println!("     📊 [{}] {}%", node_id, percent),
                    },
                },
                ExecutionEvent::FlowFinished {
                    status,
                    duration_ms,
                    ..
                } => {
                    println!("🏁 Flow {} after {}ms", status, duration_ms);
                }
            }
        }
    });

    let run = runtime.execute_flow(&flow).await?;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", run.run_id);
    println!("   Order: {}", run.report.execution_order.join(" -> "));
    println!("   Reached end node: {}", run.report.reached_end_node);

    println!();
    println!("📤 Process results:");
    for (key, value) in run.report.process_results.iter() {
        println!("   {}: {}", key, value);
    }

    println!();
    println!("🎯 Final result: {}", run.report.final_result);

    match &run.outcome {
        RunOutcome::Completed => Ok(()),
        other => bail!(other.error_message().unwrap_or_default()),
    }
}

fn check_flow(file: &Path) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let flow = load_flow(file)?;
    let registry = registry();
    let plan = validate_flow(&flow, &registry)?;

    println!("✅ Flow is valid:");
    println!("   Name: {}", flow.name);
    println!("   Nodes: {}", flow.nodes.len());
    println!("   Edges: {}", flow.edges.len());
    println!("   Start: {}", plan.start);
    println!("   End: {}", plan.end_nodes.join(", "));

    Ok(())
}

fn list_instructions() {
    println!("📦 Available Instructions:");
    println!();

    let registry = registry();

    for id in registry.list_instruction_ids() {
        if let Some(metadata) = registry.get_metadata(&id) {
            println!("  • {} ({})", id, metadata.category);
            println!("    {}", metadata.description);
            for param in &metadata.parameters {
                println!(
                    "      {:?} {}{}",
                    param.direction,
                    param.name,
                    if param.required { " (required)" } else { "" }
                );
            }
        } else {
            println!("  • {}", id);
        }
    }
}

async fn show_history(runtime: &FlowRuntime, flow_id: Option<&str>) -> Result<()> {
    let records = runtime.history(flow_id).await?;
    if records.is_empty() {
        println!("No recorded runs");
        return Ok(());
    }

    for record in records {
        let mark = if record.success { "✅" } else { "❌" };
        println!(
            "{} {} {} ({}) {:.3}s",
            mark,
            record.executed_at.format("%Y-%m-%d %H:%M:%S"),
            record.flow_name,
            record.flow_id,
            record.execution_time_seconds
        );
        if let Some(error) = record.error_message {
            println!("     {}", error);
        }
    }
    Ok(())
}

fn create_example_flow(output: &Path) -> Result<()> {
    let mut flow = Flow::new("Example Counter Flow");
    flow.description = Some("Adds two numbers and branches on the sum".to_string());

    let add = flow.add_node(
        Node::new("add", pipetasks::ids::MATH_ADD)
            .with_name("Add")
            .with_param("a", 2)
            .with_param("b", 3)
            .with_position(100.0, 100.0),
    );
    let big = flow.add_node(
        Node::new("big", pipetasks::ids::DEBUG_LOG)
            .with_name("Big sum")
            .with_param("message", "sum {{add.sum}} is big")
            .with_position(300.0, 50.0),
    );
    let small = flow.add_node(
        Node::new("small", pipetasks::ids::DEBUG_LOG)
            .with_name("Small sum")
            .with_param("message", "sum {{add.sum}} is small")
            .with_position(300.0, 150.0),
    );

    flow.connect(add.clone(), big, Some(">= 5"));
    flow.connect(add, small, None);

    let json = serde_json::to_string_pretty(&flow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  pipeflow run --file {}", output.display());

    Ok(())
}
