//! Wires the pipeline controller to the UI state.
//!
//! The state lives in a `tokio::sync::watch` channel: the session is its only
//! writer, any number of views can subscribe, and every transition swaps the
//! whole value at once.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use graphrag_shared::RunId;
use graphrag_transport::Transport;

use crate::context::RunContext;
use crate::pipeline::{ProgressReporter, SilentProgress, run_pipeline};
use crate::stage::Pipeline;
use crate::state::UiState;

/// Handle to a run spawned by [`Session::submit`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    task: JoinHandle<()>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Wait until the run's outcome has been applied to the state.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// One user's query session: a pipeline, a transport and the UI state.
pub struct Session<T> {
    pipeline: Arc<Pipeline>,
    transport: Arc<T>,
    progress: Arc<dyn ProgressReporter>,
    state: Arc<watch::Sender<UiState>>,
}

impl<T: Transport + 'static> Session<T> {
    pub fn new(pipeline: Pipeline, transport: T) -> Self {
        let (state, _) = watch::channel(UiState::default());
        Self {
            pipeline: Arc::new(pipeline),
            transport: Arc::new(transport),
            progress: Arc::new(SilentProgress),
            state: Arc::new(state),
        }
    }

    /// Report stage progress to `progress` instead of discarding it.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_if_modified(|state| {
            if state.input == text {
                return false;
            }
            state.input = text;
            true
        });
    }

    /// Start a run for `text` on the current tokio runtime.
    ///
    /// Returns `None` without side effects when a run is already in flight
    /// or `text` is blank.
    pub fn submit(&self, text: &str) -> Option<RunHandle> {
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            ticket = state.submit(text);
            ticket.is_some()
        });
        let ticket = ticket?;
        let run_id = ticket.run_id;
        info!(%run_id, pipeline = self.pipeline.name(), "run submitted");

        let pipeline = Arc::clone(&self.pipeline);
        let transport = Arc::clone(&self.transport);
        let progress = Arc::clone(&self.progress);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let context = RunContext::with_run_id(ticket.run_id, ticket.query);
            let outcome =
                run_pipeline(&pipeline, transport.as_ref(), context, progress.as_ref()).await;

            let applied = state.send_if_modified(|s| s.resolve(run_id, outcome, Utc::now()));
            if !applied {
                debug!(%run_id, "run outcome discarded");
            }
        });

        Some(RunHandle { run_id, task })
    }

    /// Dismiss the resolved report. Returns `false` while a run is in flight.
    pub fn close(&self) -> bool {
        self.state.send_if_modified(UiState::close)
    }
}
