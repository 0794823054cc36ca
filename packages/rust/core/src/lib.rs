//! Request pipeline controller and UI state store for the GraphRAG client.
//!
//! This crate turns a user query into a [`PipelineOutcome`] by running an
//! ordered list of [`Stage`]s against a [`Transport`], and keeps the
//! observable [`UiState`] consistent across runs via [`Session`].
//!
//! [`PipelineOutcome`]: graphrag_shared::PipelineOutcome
//! [`Transport`]: graphrag_transport::Transport

pub mod context;
pub mod pipeline;
pub mod session;
pub mod stage;
pub mod state;

#[cfg(test)]
mod testing;

pub use context::RunContext;
pub use pipeline::{ProgressReporter, SilentProgress, execute, run_pipeline};
pub use session::{RunHandle, Session};
pub use stage::{Pipeline, Stage};
pub use state::{Phase, Resolution, RunTicket, UiState};
