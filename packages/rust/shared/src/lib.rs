//! Shared types, error model, and configuration for the GraphRAG client.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`GraphRagError`] and [`StageError`]: the error model
//! - Domain types ([`Query`], [`RunId`], [`Report`], [`SourceStats`], [`PipelineOutcome`])
//! - Configuration ([`AppConfig`], [`ClientConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClientConfig, EndpointsConfig, PipelineConfig, PipelineShape, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FailureKind, GraphRagError, Result, StageError};
pub use types::{PipelineOutcome, Query, Report, RunId, SourceStats};
