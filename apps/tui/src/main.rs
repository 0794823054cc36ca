//! GraphRAG TUI: ask the research backend questions from the terminal.
//!
//! Renders the session's UI state with `ratatui` + `crossterm`. Logs go to
//! `graphrag-tui.log` in the config directory so they never tear the screen.

mod app;
mod screens;
mod widgets;

use std::fs::OpenOptions;
use std::sync::Mutex;

use color_eyre::eyre::Result;
use graphrag_shared::{config_dir, load_config};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "graphrag-tui.log";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let config = load_config()?;
    app::run(config)
}

fn init_tracing() -> Result<()> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphrag=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
