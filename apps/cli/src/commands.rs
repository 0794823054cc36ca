//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use graphrag_core::{Pipeline, ProgressReporter, RunContext, run_pipeline};
use graphrag_shared::{
    AppConfig, ClientConfig, PipelineOutcome, PipelineShape, Query, Report, RunId, init_config,
    load_config, load_config_from,
};
use graphrag_transport::HttpTransport;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// GraphRAG: research questions answered by a graph-backed agent pipeline.
#[derive(Parser)]
#[command(
    name = "graphrag",
    version,
    about = "Ask the GraphRAG research backend a question and print its report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.graphrag/graphrag.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the backend or its proxy.
    #[arg(long, env = "GRAPHRAG_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline for a query and print the report.
    Ask {
        /// The question to research.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Pipeline shape: combined or decomposed.
        #[arg(short, long)]
        shape: Option<String>,

        /// Timeout for the report-producing stage, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the outcome as JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },

    /// Check that the backend answers its health endpoint.
    Health {
        /// Health endpoint path (defaults to endpoints.health).
        #[arg(long)]
        endpoint: Option<String>,

        /// Timeout in milliseconds.
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "graphrag=warn",
        1 => "graphrag=info",
        2 => "graphrag=debug",
        _ => "graphrag=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.server.base_url = base_url.clone();
    }

    match cli.command {
        Command::Ask {
            query,
            shape,
            timeout_ms,
            json,
        } => cmd_ask(config, &query.join(" "), shape.as_deref(), timeout_ms, json).await,
        Command::Health {
            endpoint,
            timeout_ms,
        } => cmd_health(&config, endpoint.as_deref(), timeout_ms).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(
    mut config: AppConfig,
    text: &str,
    shape: Option<&str>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let query = Query::new(text)?;

    if let Some(shape) = shape {
        config.pipeline.shape = shape.parse::<PipelineShape>()?;
    }
    if let Some(ms) = timeout_ms {
        config.pipeline.report_timeout_ms = ms;
    }

    let client = ClientConfig::try_from(&config)?;
    let transport = HttpTransport::from_config(&client)?;
    let pipeline = Pipeline::from_config(&client);

    info!(
        query = %query,
        shape = %client.shape,
        base_url = %client.base_url,
        "asking"
    );

    let reporter = CliProgress::new();
    let outcome = run_pipeline(&pipeline, &transport, RunContext::new(query), &reporter).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        PipelineOutcome::Report(report) => {
            if !json {
                print_report(&report);
            }
            Ok(())
        }
        PipelineOutcome::Error { message, .. } => Err(eyre!(message)),
    }
}

fn print_report(report: &Report) {
    println!("# {}", report.title);
    println!();
    println!("{}", report.content.trim_end());

    if let Some(stats) = &report.source_stats {
        println!();
        println!("---");
        println!(
            "Sources: {} search results · {} graph entities · {} relationships",
            stats.search_results_count, stats.neo4j_entities, stats.neo4j_relationships
        );
    }
}

async fn cmd_health(config: &AppConfig, endpoint: Option<&str>, timeout_ms: u64) -> Result<()> {
    let client = ClientConfig::try_from(config)?;
    let transport = HttpTransport::from_config(&client)?;
    let endpoint = endpoint.unwrap_or(&client.endpoints.health);

    let url = transport.resolve(endpoint)?;
    info!(%url, "checking backend health");

    let body = transport
        .health(endpoint, Duration::from_millis(timeout_ms))
        .await
        .map_err(|e| eyre!("{url}: {e}"))?;

    println!("{url}: {}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn run_started(&self, _run_id: RunId, _query: &Query, pipeline: &str) {
        self.spinner.set_message(format!("Starting {pipeline} pipeline"));
    }

    fn stage_started(&self, stage: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {stage}"));
    }

    fn stage_completed(&self, stage: &str, current: usize, total: usize, elapsed: Duration) {
        self.spinner.println(format!(
            "  ✓ [{current}/{total}] {stage} ({:.1}s)",
            elapsed.as_secs_f64()
        ));
    }

    fn done(&self, _outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
    }
}
