mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use nodeflow_core::config::AppConfig;
use nodeflow_core::event::{next_event, EventBus};
use nodeflow_core::types::{NotificationLevel, WorkflowEvent};
use nodeflow_engine::{build_graph, find_start_nodes, pass_data_between_nodes, Workflow, WorkflowEngine};

#[derive(Parser)]
#[command(name = "nodeflow", version, about = "Run AI task workflows as directed graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "nodeflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow and print the resulting nodes as JSON
    Run {
        /// Workflow JSON file
        workflow: PathBuf,
        /// Write the resulting workflow here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use canned task outputs instead of calling the provider
        #[arg(long)]
        simulate: bool,
    },
    /// Propagate existing outputs along every edge without running anything
    Preview {
        /// Workflow JSON file
        workflow: PathBuf,
        /// Write the resulting workflow here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show adjacency, in-degrees and start nodes
    Graph {
        /// Workflow JSON file
        workflow: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Run configuration health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nodeflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "nodeflow", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Run {
            workflow,
            output,
            simulate,
        } => {
            if simulate {
                config.simulate = true;
            }
            run_workflow(&config, &workflow, output.as_deref()).await?;
        }
        Commands::Preview { workflow, output } => {
            let wf = Workflow::load(&workflow)?;
            let nodes = pass_data_between_nodes(wf.nodes, &wf.edges);
            write_workflow(&Workflow::new(nodes, wf.edges), output.as_deref())?;
        }
        Commands::Graph { workflow } => {
            print_graph(&Workflow::load(&workflow)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Doctor => {
            println!("Nodeflow Doctor");
            println!("===============");
            doctor::run_doctor(&config);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

async fn run_workflow(config: &AppConfig, path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let wf = Workflow::load(path)?;
    let registry = nodeflow_tasks::create_registry(config)?;

    let event_bus = Arc::new(EventBus::new(config.engine.event_capacity.max(1)));
    let engine = WorkflowEngine::from_config(Arc::new(registry), event_bus.clone(), &config.engine);

    // Spawn notification printer
    let mut rx = event_bus.subscribe();
    let print_handle = tokio::spawn(async move {
        while let Some(event) = next_event(&mut rx).await {
            render_event(&event);
            if matches!(event, WorkflowEvent::RunComplete { .. }) {
                break;
            }
        }
    });

    let result = match engine.run(wf.nodes, &wf.edges).await {
        Ok(result) => result,
        Err(e) => {
            print_handle.abort();
            error!(error = %e, "Workflow run failed");
            return Err(e.into());
        }
    };
    print_handle.await.ok();

    write_workflow(&Workflow::new(result.nodes.clone(), wf.edges), output)?;

    let failed = result.failed_nodes().count();
    if failed > 0 {
        anyhow::bail!(
            "{} of {} executed nodes failed",
            failed,
            result.node_results.len()
        );
    }
    Ok(())
}

fn render_event(event: &WorkflowEvent) {
    let tag = match event.level() {
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "ERROR",
        NotificationLevel::Success => "done",
    };
    eprintln!("[{}] {}", tag, event.message());
}

fn write_workflow(wf: &Workflow, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            wf.save(path)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(wf)?),
    }
    Ok(())
}

fn print_graph(wf: &Workflow) {
    let graph = build_graph(&wf.nodes, &wf.edges);

    println!("Nodes ({}):", graph.len());
    for (i, node) in wf.nodes.iter().enumerate() {
        let children: Vec<&str> = graph.children(i).iter().map(|&c| graph.id(c)).collect();
        println!(
            "  {:<12} {:<17} in={} -> [{}]",
            node.id,
            node.task_kind.as_str(),
            graph.in_degree(i),
            children.join(", ")
        );
    }

    let dangling = wf
        .edges
        .iter()
        .filter(|e| match e.endpoints() {
            Some((s, t)) => graph.index_of(s).is_none() || graph.index_of(t).is_none(),
            None => true,
        })
        .count();
    if dangling > 0 {
        println!("\n  {} edge(s) ignored (missing or unknown endpoint)", dangling);
    }
    for dup in graph.duplicate_ids() {
        println!("\n  [!!] duplicate node id '{}'", dup);
    }

    let starts = find_start_nodes(&graph);
    if starts.is_empty() && !graph.is_empty() {
        println!(
            "\nStart nodes: none (cycle suspected, a run would start from '{}')",
            graph.id(0)
        );
    } else {
        let ids: Vec<&str> = starts.iter().map(|&i| graph.id(i)).collect();
        println!("\nStart nodes: {}", ids.join(", "));
    }
}
