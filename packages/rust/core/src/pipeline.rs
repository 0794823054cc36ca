//! Pipeline controller: query → stages in order → report or error.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use graphrag_shared::{PipelineOutcome, Query, Report, RunId, StageError};
use graphrag_transport::Transport;

use crate::context::RunContext;
use crate::stage::{Pipeline, Stage};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first stage.
    fn run_started(&self, run_id: RunId, query: &Query, pipeline: &str);
    /// Called when a stage is about to send its request.
    fn stage_started(&self, stage: &str, current: usize, total: usize);
    /// Called after a stage's response has been merged.
    fn stage_completed(&self, stage: &str, current: usize, total: usize, elapsed: Duration);
    /// Called with the terminal outcome.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn run_started(&self, _run_id: RunId, _query: &Query, _pipeline: &str) {}
    fn stage_started(&self, _stage: &str, _current: usize, _total: usize) {}
    fn stage_completed(&self, _stage: &str, _current: usize, _total: usize, _elapsed: Duration) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

/// Run `pipeline` for the query in `context` and fold the result into a
/// [`PipelineOutcome`].
///
/// Never fails: every stage failure becomes `PipelineOutcome::Error` with
/// the user-facing message for its kind.
#[instrument(skip_all, fields(run_id = %context.run_id, pipeline = %pipeline.name()))]
pub async fn run_pipeline<T: Transport>(
    pipeline: &Pipeline,
    transport: &T,
    context: RunContext,
    progress: &dyn ProgressReporter,
) -> PipelineOutcome {
    let start = Instant::now();
    let outcome = match execute(pipeline, transport, context, progress).await {
        Ok(report) => {
            info!(
                content_len = report.content.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "run produced a report"
            );
            PipelineOutcome::Report(report)
        }
        Err(err) => {
            warn!(error = %err, elapsed_ms = start.elapsed().as_millis(), "run failed");
            PipelineOutcome::Error {
                message: err.user_message(),
                kind: err.kind(),
            }
        }
    };

    progress.done(&outcome);
    outcome
}

/// Execute every stage in order, stopping at the first failure.
///
/// 1. Build the stage request from the context so far
/// 2. Send it, bounded by the stage timeout
/// 3. Merge the response into the context
/// 4. After the last stage, require a non-empty report
pub async fn execute<T: Transport>(
    pipeline: &Pipeline,
    transport: &T,
    mut context: RunContext,
    progress: &dyn ProgressReporter,
) -> Result<Report, StageError> {
    let total = pipeline.stages().len();
    progress.run_started(context.run_id, &context.query, pipeline.name());
    info!(query = %context.query, stages = total, "starting run");

    for (index, stage) in pipeline.stages().iter().enumerate() {
        let current = index + 1;
        context.current_stage = Some(stage.name);
        progress.stage_started(stage.name, current, total);

        let started = Instant::now();
        let request = (stage.build_request)(&context);
        debug!(stage = stage.name, endpoint = %stage.endpoint, "stage request built");

        let response = call_stage(transport, stage, &request).await.inspect_err(|e| {
            warn!(stage = stage.name, error = %e, "stage call failed, aborting run");
        })?;

        context = (stage.merge_response)(context, &response).inspect_err(|e| {
            warn!(stage = stage.name, error = %e, "stage response rejected, aborting run");
        })?;
        context.completed_stages.push(stage.name);

        let elapsed = started.elapsed();
        debug!(stage = stage.name, elapsed_ms = elapsed.as_millis(), "stage merged");
        progress.stage_completed(stage.name, current, total, elapsed);
    }

    context.current_stage = None;
    finish(context)
}

/// One transport call, cut off at the stage timeout. A cut-off call is
/// dropped, so a response arriving later is never merged.
async fn call_stage<T: Transport>(
    transport: &T,
    stage: &Stage,
    request: &serde_json::Value,
) -> Result<serde_json::Value, StageError> {
    let call = transport.send(stage.method, &stage.endpoint, Some(request), stage.timeout);

    match stage.timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StageError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            })?,
        None => call.await,
    }
}

/// A 2xx final stage is not enough: the report itself must be present.
fn finish(context: RunContext) -> Result<Report, StageError> {
    let content = context
        .report
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| StageError::missing("report"))?;

    Ok(Report {
        title: context.query.as_str().to_string(),
        content,
        source_stats: context.source_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use graphrag_shared::{EndpointsConfig, FailureKind, SourceStats};
    use serde_json::json;

    use crate::testing::{Reply, ScriptedTransport};

    fn decomposed() -> Pipeline {
        Pipeline::decomposed(
            &EndpointsConfig::default(),
            Some(Duration::from_millis(200)),
            Duration::from_millis(200),
        )
    }

    fn context(query: &str) -> RunContext {
        RunContext::new(Query::new(query).unwrap())
    }

    #[tokio::test]
    async fn decomposed_run_threads_fields_into_report() {
        let transport = ScriptedTransport::new(vec![
            Reply::Json(json!({"results": [{"title": "A", "url": "https://a"}]})),
            Reply::Json(json!({"action": "scrape", "details": {"urls_to_scrape": ["u1"]}})),
            Reply::Json(json!({
                "report": "R",
                "sources": {"search_results_count": 1, "neo4j_entities": 4, "neo4j_relationships": 2}
            })),
        ]);

        let outcome =
            run_pipeline(&decomposed(), &transport, context("graph rag"), &SilentProgress).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Report(Report {
                title: "graph rag".into(),
                content: "R".into(),
                source_stats: Some(SourceStats {
                    search_results_count: 1,
                    neo4j_entities: 4,
                    neo4j_relationships: 2,
                }),
            })
        );

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].endpoint, "/api/search");
        assert_eq!(calls[0].body, Some(json!({"query": "graph rag"})));
        assert_eq!(
            calls[1].body,
            Some(json!({"query": "graph rag", "results": [{"title": "A", "url": "https://a"}]}))
        );
        assert_eq!(
            calls[2].body,
            Some(json!({
                "query": "graph rag",
                "action": "scrape",
                "search_results": [{"title": "A", "url": "https://a"}],
                "urls_to_scrape": ["u1"]
            }))
        );
    }

    #[tokio::test]
    async fn combined_run_makes_one_call() {
        let transport = ScriptedTransport::new(vec![Reply::Json(json!({"report": "# Answer"}))]);
        let pipeline = Pipeline::combined(&EndpointsConfig::default(), Duration::from_secs(1));

        let outcome = run_pipeline(&pipeline, &transport, context("q"), &SilentProgress).await;

        assert!(matches!(outcome, PipelineOutcome::Report(ref r) if r.content == "# Answer"));
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(transport.calls()[0].endpoint, "/api/analyze");
    }

    #[tokio::test]
    async fn failure_stops_later_stages() {
        let transport = ScriptedTransport::new(vec![
            Reply::Json(json!({"results": []})),
            Reply::Fail(StageError::ServerError {
                status: 500,
                detail: "analysis agent crashed".into(),
            }),
            Reply::Json(json!({"report": "never"})),
        ]);

        let outcome = run_pipeline(&decomposed(), &transport, context("q"), &SilentProgress).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Error {
                message: "analysis agent crashed".into(),
                kind: FailureKind::ServerError,
            }
        );
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn hanging_stage_times_out_and_stops() {
        let transport = ScriptedTransport::new(vec![Reply::Hang, Reply::Json(json!({}))]);

        let outcome = run_pipeline(&decomposed(), &transport, context("q"), &SilentProgress).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Error {
                message: "request timed out, try again later".into(),
                kind: FailureKind::Timeout,
            }
        );
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_report_is_malformed_not_empty_report() {
        let transport = ScriptedTransport::new(vec![
            Reply::Json(json!({"results": []})),
            Reply::Json(json!({"action": "generate_report"})),
            Reply::Json(json!({"sources": {"search_results_count": 0}})),
        ]);

        let outcome = run_pipeline(&decomposed(), &transport, context("q"), &SilentProgress).await;

        assert_eq!(
            outcome,
            PipelineOutcome::Error {
                message: "server did not return the expected report content".into(),
                kind: FailureKind::MalformedResponse,
            }
        );
    }

    #[tokio::test]
    async fn blank_report_is_malformed() {
        let transport = ScriptedTransport::new(vec![Reply::Json(json!({"report": "  "}))]);
        let pipeline = Pipeline::combined(&EndpointsConfig::default(), Duration::from_secs(1));

        let err = execute(&pipeline, &transport, context("q"), &SilentProgress)
            .await
            .unwrap_err();

        assert_eq!(err, StageError::missing("report"));
    }

    #[tokio::test]
    async fn intermediate_stage_missing_field_aborts() {
        let transport = ScriptedTransport::new(vec![
            Reply::Json(json!({"items": []})),
            Reply::Json(json!({"action": "x"})),
        ]);

        let err = execute(&decomposed(), &transport, context("q"), &SilentProgress)
            .await
            .unwrap_err();

        assert_eq!(err, StageError::missing("results"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn run_started(&self, _run_id: RunId, query: &Query, pipeline: &str) {
            self.events.lock().unwrap().push(format!("start {pipeline} {query}"));
        }
        fn stage_started(&self, stage: &str, current: usize, total: usize) {
            self.events.lock().unwrap().push(format!("{stage} {current}/{total}"));
        }
        fn stage_completed(&self, stage: &str, _current: usize, _total: usize, _e: Duration) {
            self.events.lock().unwrap().push(format!("{stage} ok"));
        }
        fn done(&self, outcome: &PipelineOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done report={}", outcome.is_report()));
        }
    }

    #[tokio::test]
    async fn progress_sees_each_stage_in_order() {
        let transport = ScriptedTransport::new(vec![
            Reply::Json(json!({"results": []})),
            Reply::Fail(StageError::Timeout { timeout_ms: 1 }),
        ]);
        let progress = RecordingProgress::default();

        run_pipeline(&decomposed(), &transport, context("q"), &progress).await;

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(
            events,
            [
                "start decomposed q",
                "search 1/3",
                "search ok",
                "analyze 2/3",
                "done report=false",
            ]
        );
    }
}
