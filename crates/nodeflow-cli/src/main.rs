use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nodeflow_core::{Edge, ExecutedRecord, ExecutionEvent, GraphPayload, NodeEvent, NodeSpec};
use nodeflow_host::{
    spawn_signal_listener, Controller, ControllerConfig, Host, HostConfig, RunOutcome,
};
use nodeflow_runtime::{unknown_node_types, EngineConfig, GraphAnalysis, RunContext, Scheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nodeflow")]
#[command(about = "Workflow graph execution engine", long_about = None)]
struct Cli {
    /// Re-visits allowed per node before a cycle is cut
    #[arg(long, global = true, env = "NODEFLOW_MAX_LOOP", default_value_t = 3)]
    max_loop: u32,

    /// Hard limit for one worker run, in seconds
    #[arg(long, global = true, env = "NODEFLOW_WATCHDOG_SECS", default_value_t = 50)]
    watchdog_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph payload
    Run {
        /// Path to payload JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Execute in this process instead of a worker
        #[arg(long)]
        in_process: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Serve one run over stdin/stdout
    Worker,

    /// Validate a payload file
    Validate {
        /// Path to payload JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create an example payload
    Init {
        /// Output file path
        #[arg(short, long, default_value = "payload.json")]
        output: PathBuf,
    },
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_loop: self.max_loop,
        }
    }

    fn host_config(&self) -> HostConfig {
        HostConfig {
            watchdog: Duration::from_secs(self.watchdog_secs),
            ..HostConfig::default()
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout belongs to the control channel in worker mode and to results otherwise
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            file,
            in_process,
            verbose,
        } => {
            init_logging(*verbose);
            let payload = load_payload(file)?;
            if *in_process {
                run_in_process(&cli, payload).await?;
            } else {
                run_in_worker(&cli, payload).await?;
            }
        }

        Commands::Worker => {
            init_logging(false);
            let code = run_worker(&cli).await;
            std::process::exit(code);
        }

        Commands::Validate { file } => {
            validate_payload(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_payload(output)?;
        }
    }

    Ok(())
}

fn load_payload(file: &Path) -> Result<GraphPayload> {
    GraphPayload::load(file).with_context(|| format!("Failed to load {}", file.display()))
}

async fn run_worker(cli: &Cli) -> i32 {
    let registry = Arc::new(nodeflow_nodes::standard_registry());
    let host = Host::new(registry, cli.engine_config(), cli.host_config());
    spawn_signal_listener(host.shutdown_token());

    let exit = host.serve(tokio::io::stdin(), tokio::io::stdout()).await;
    tracing::info!(?exit, "Worker exiting");
    exit.code()
}

async fn run_in_worker(cli: &Cli, payload: GraphPayload) -> Result<()> {
    let program = std::env::current_exe().context("Cannot locate the nodeflow binary")?;
    let args = vec![
        "worker".to_string(),
        "--max-loop".to_string(),
        cli.max_loop.to_string(),
        "--watchdog-secs".to_string(),
        cli.watchdog_secs.to_string(),
    ];
    let controller = Controller::new(ControllerConfig::new(program, args, &cli.host_config()));

    match controller.run(&payload).await? {
        RunOutcome::Finished(executed) => print_records(&executed),
        RunOutcome::Failed(failure) => {
            print_records(&failure.executed)?;
            bail!("Node {} failed: {}", failure.node_id, failure.error);
        }
    }
}

async fn run_in_process(cli: &Cli, payload: GraphPayload) -> Result<()> {
    let registry = Arc::new(nodeflow_nodes::standard_registry());
    let ctx = RunContext::new(registry, cli.engine_config());

    let mut events = ctx.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted {
                    starting_node_ids, ..
                } => {
                    eprintln!("▶️  Run started from {:?}", starting_node_ids);
                }
                ExecutionEvent::NodeStarted {
                    node_id,
                    node_type,
                    iterations,
                    depth,
                    ..
                } => {
                    eprintln!(
                        "  ⚡ {} ({}) depth {}, {} iteration(s)",
                        node_id, node_type, depth, iterations
                    );
                }
                ExecutionEvent::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    eprintln!("  ✅ {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeSkipped {
                    node_id, reason, ..
                } => {
                    eprintln!("  ⏭️  {} skipped: {}", node_id, reason);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    eprintln!("  ❌ {} failed: {}", node_id, error);
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        eprintln!("     ℹ️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Warning { message } => {
                        eprintln!("     ⚠️  [{}] {}", node_id, message);
                    }
                },
                ExecutionEvent::WorkflowCompleted {
                    success,
                    executed_nodes,
                    duration_ms,
                    ..
                } => {
                    if success {
                        eprintln!(
                            "✨ Run completed: {} node(s) in {}ms",
                            executed_nodes, duration_ms
                        );
                    } else {
                        eprintln!("💥 Run failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let result = Scheduler::new(&ctx).execute(&payload).await;

    // let the listener drain what was already sent
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    match result {
        Ok(executed) => print_records(&executed),
        Err(failure) => {
            print_records(&failure.executed)?;
            bail!("Node {} failed: {}", failure.node_id, failure.error);
        }
    }
}

fn print_records(executed: &[ExecutedRecord]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(executed)?);
    Ok(())
}

fn validate_payload(file: &Path) -> Result<()> {
    println!("🔍 Validating payload: {}", file.display());

    let payload = load_payload(file)?;
    let registry = nodeflow_nodes::standard_registry();
    let analysis = GraphAnalysis::analyze(&payload);

    println!("   Roots: {}", payload.starting_node_ids.join(", "));
    println!("   Nodes: {}", analysis.node_count);
    println!("   Edges: {}", analysis.edge_count);

    let mut errors = analysis.errors();
    errors.extend(unknown_node_types(&payload, &registry));
    for error in &errors {
        println!("   ❌ {}", error);
    }

    if analysis.has_cycles() {
        println!(
            "   🔁 cycle through {} (bounded by --max-loop)",
            analysis.cyclic_nodes.join(", ")
        );
    }
    for node in &analysis.unreachable {
        println!("   ⚠️  {} is unreachable from the starting nodes", node);
    }

    if !errors.is_empty() {
        bail!("{} structural problem(s); affected nodes would be skipped", errors.len());
    }
    println!("✅ Payload is valid");
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = nodeflow_nodes::standard_registry();

    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
            for param in &metadata.params {
                let marker = if param.required { "*" } else { " " };
                println!("      {}{}: {}", marker, param.name, param.description);
            }
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_payload(output: &Path) -> Result<()> {
    let mut payload = GraphPayload::new(vec!["trigger".to_string()]);

    payload.add_node(NodeSpec::new("trigger", "debug.log").with_label("Trigger"));
    payload.add_node(
        NodeSpec::new("fetch", "http.request")
            .with_label("Fetch Todos")
            .with_param("url", "https://jsonplaceholder.typicode.com/todos?_limit=3")
            .with_param("method", "GET"),
    );
    payload.add_node(
        NodeSpec::new("check", "control.if_else")
            .with_label("Completed?")
            .with_param("value1", "{{fetch[data].body[$index].completed]}}")
            .with_param("operation", "equal")
            .with_param("value2", true),
    );
    payload.add_node(
        NodeSpec::new("done", "debug.log")
            .with_label("Done")
            .with_param("message", "finished {{fetch[data].body[$index].title]}}"),
    );
    payload.add_node(
        NodeSpec::new("open", "debug.log")
            .with_label("Open")
            .with_param("message", "still open {{fetch[data].body[$index].title]}}"),
    );

    payload.connect("trigger", "fetch");
    payload.connect("fetch", "check");
    payload.edges.push(Edge::from_output("check", 0, "done"));
    payload.edges.push(Edge::from_output("check", 1, "open"));

    let json = serde_json::to_string_pretty(&payload)?;
    std::fs::write(output, json)?;

    println!("✨ Created example payload: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  nodeflow run --file {}", output.display());

    Ok(())
}
