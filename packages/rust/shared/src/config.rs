//! Application configuration for the GraphRAG client.
//!
//! User config lives at `~/.graphrag/graphrag.toml`.
//! CLI flags override config file values, which override defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GraphRagError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "graphrag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".graphrag";

// ---------------------------------------------------------------------------
// Config structs (matching graphrag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the backend (or its reverse proxy) lives.
    #[serde(default)]
    pub server: ServerConfig,

    /// Pipeline shape and timeouts.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logical endpoint paths, joined onto `server.base_url`.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL every endpoint path is resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which stage list to run.
    #[serde(default)]
    pub shape: PipelineShape,

    /// Timeout for the report-producing (final) stage.
    #[serde(default = "default_report_timeout_ms")]
    pub report_timeout_ms: u64,

    /// Timeout for intermediate stages. `0` disables it.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shape: PipelineShape::default(),
            report_timeout_ms: default_report_timeout_ms(),
            stage_timeout_ms: default_stage_timeout_ms(),
        }
    }
}

fn default_report_timeout_ms() -> u64 {
    180_000
}
fn default_stage_timeout_ms() -> u64 {
    60_000
}

/// `[endpoints]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_search_endpoint")]
    pub search: String,
    #[serde(default = "default_analyze_endpoint")]
    pub analyze: String,
    #[serde(default = "default_orchestrate_endpoint")]
    pub orchestrate: String,
    #[serde(default = "default_health_endpoint")]
    pub health: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            search: default_search_endpoint(),
            analyze: default_analyze_endpoint(),
            orchestrate: default_orchestrate_endpoint(),
            health: default_health_endpoint(),
        }
    }
}

fn default_search_endpoint() -> String {
    "/api/search".into()
}
fn default_analyze_endpoint() -> String {
    "/api/analyze".into()
}
fn default_orchestrate_endpoint() -> String {
    "/api/orchestrate".into()
}
fn default_health_endpoint() -> String {
    "/api/health".into()
}

// ---------------------------------------------------------------------------
// Pipeline shape
// ---------------------------------------------------------------------------

/// The two stage lists the client knows how to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineShape {
    /// One call to the analyze endpoint; search and report happen server-side.
    Combined,
    /// search → analyze → orchestrate, threaded by the client.
    #[default]
    Decomposed,
}

impl PipelineShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Decomposed => "decomposed",
        }
    }
}

impl fmt::Display for PipelineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineShape {
    type Err = GraphRagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(Self::Combined),
            "decomposed" => Ok(Self::Decomposed),
            other => Err(GraphRagError::config(format!(
                "unknown pipeline shape '{other}': expected 'combined' or 'decomposed'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Client config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime client configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for endpoint resolution.
    pub base_url: Url,
    /// Stage list to build.
    pub shape: PipelineShape,
    /// Timeout of the report-producing stage.
    pub report_timeout: Duration,
    /// Timeout of intermediate stages, if any.
    pub stage_timeout: Option<Duration>,
    /// Logical endpoint paths.
    pub endpoints: EndpointsConfig,
}

impl TryFrom<&AppConfig> for ClientConfig {
    type Error = GraphRagError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.server.base_url).map_err(|e| {
            GraphRagError::config(format!(
                "invalid server.base_url '{}': {e}",
                config.server.base_url
            ))
        })?;

        if config.pipeline.report_timeout_ms == 0 {
            return Err(GraphRagError::config(
                "pipeline.report_timeout_ms must be greater than zero",
            ));
        }

        let stage_timeout = match config.pipeline.stage_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(Self {
            base_url,
            shape: config.pipeline.shape,
            report_timeout: Duration::from_millis(config.pipeline.report_timeout_ms),
            stage_timeout,
            endpoints: config.endpoints.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.graphrag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GraphRagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.graphrag/graphrag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphRagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GraphRagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphRagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GraphRagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphRagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
