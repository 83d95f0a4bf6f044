mod prompts;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scribe_core::config::AppConfig;
use scribe_core::event::EventBus;
use scribe_core::types::SwarmEvent;
use scribe_swarm::{AgentEngine, Swarm};
use scribe_tools::ToolRegistry;

use prompts::Source;

#[derive(Parser)]
#[command(
    name = "scribe",
    version,
    about = "Write, illustrate and publish a Dev.to article with an agent swarm"
)]
struct Cli {
    /// Article topic
    #[arg(conflicts_with_all = ["file", "content"])]
    topic: Option<String>,

    /// Source material to turn into an article, read from a file
    #[arg(short, long, conflicts_with = "content")]
    file: Option<PathBuf>,

    /// Source material to turn into an article
    #[arg(long)]
    content: Option<String>,

    /// Path to config file
    #[arg(short, long, default_value = "scribe.toml")]
    config: PathBuf,

    /// Print the full run result as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn source(&self) -> anyhow::Result<Source> {
        if let Some(topic) = &self.topic {
            return Ok(Source::Topic(topic.clone()));
        }
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return Ok(Source::Content(text));
        }
        if let Some(content) = &self.content {
            return Ok(Source::Content(content.clone()));
        }
        bail!("give a topic, --file <path> or --content <text>")
    }
}

/// Print run progress to stderr until the bus closes or the run finishes.
fn spawn_progress_printer(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                SwarmEvent::NodeStarted {
                    node_id, iteration, ..
                } => eprintln!("[{}] {} is working", iteration, node_id),
                SwarmEvent::Handoff { from, to, .. } => eprintln!("    {} -> {}", from, to),
                SwarmEvent::ToolStart { node_id, name, .. } => {
                    eprintln!("    {} calls {}", node_id, name)
                }
                SwarmEvent::ToolEnd { name, result, .. } => {
                    let status = if result.is_error() { "failed" } else { "ok" };
                    eprintln!("    {} {}: {}", name, status, result.message)
                }
                SwarmEvent::RunFinished { .. } => break,
                _ => {}
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scribe=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let source = cli.source()?;
    let config = AppConfig::load_or_default(&cli.config)?;

    if config.tools.devto_key().is_none() {
        error!("DEV_TO_API_KEY is not set; add it to your environment or .env file");
        return Ok(ExitCode::FAILURE);
    }

    let model = config.resolved_model();
    let llm = scribe_llm::create_client(&model)?;
    let tools = Arc::new(ToolRegistry::with_builtins(&config.tools));
    let nodes = prompts::article_nodes();
    let bus = Arc::new(EventBus::default());

    let engine = AgentEngine::new(llm, model, tools, &nodes)?
        .with_config(config.agent.clone())
        .with_working_dir(config.working_dir())
        .with_event_bus(Arc::clone(&bus));

    let swarm = Swarm::builder()
        .nodes(nodes)
        .entry_point(prompts::WRITER)
        .config(config.swarm_config())
        .engine(Arc::new(engine))
        .event_bus(Arc::clone(&bus))
        .build()?;

    let printer = (!cli.json).then(|| spawn_progress_printer(&bus));

    info!(model = %config.model.model_id, "Starting article swarm");
    let result = swarm.run(prompts::initial_message(&source)).await;

    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::render(&result));
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
