//! GraphRAG CLI: ask the research backend a question from the terminal.
//!
//! Runs the configured stage pipeline (search → analyze → report, or the
//! combined endpoint) and prints the resulting report.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
