//! Declarative stage descriptors and the two stage lists the client runs.
//!
//! A [`Stage`] is pure data: where to send, how to build the request body
//! from the [`RunContext`], and how to fold the response back into it.
//! Switching between the combined and decomposed backends is a matter of
//! building a different [`Pipeline`], never of branching in the controller.

use std::time::Duration;

use serde_json::{Map, Value, json};

use graphrag_shared::{
    ClientConfig, EndpointsConfig, GraphRagError, PipelineShape, Result, SourceStats, StageError,
};
use graphrag_transport::Method;

use crate::context::RunContext;

/// Builds a stage's request body from the context so far.
pub type BuildRequest = fn(&RunContext) -> Value;

/// Folds a stage's response into the context, or rejects it as malformed.
pub type MergeResponse = fn(RunContext, &Value) -> std::result::Result<RunContext, StageError>;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One request/response step of a pipeline.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Short name used in logs and progress output.
    pub name: &'static str,
    /// Logical endpoint, resolved by the transport.
    pub endpoint: String,
    pub method: Method,
    /// Upper bound on the call; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub build_request: BuildRequest,
    pub merge_response: MergeResponse,
}

impl Stage {
    /// `POST {query}` → `{results: [...]}`.
    pub fn search(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: "search",
            endpoint: endpoint.into(),
            method: Method::Post,
            timeout,
            build_request: query_only_request,
            merge_response: merge_search,
        }
    }

    /// `POST {query, results?}` → `{action, details?: {urls_to_scrape?}}`.
    pub fn analyze(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: "analyze",
            endpoint: endpoint.into(),
            method: Method::Post,
            timeout,
            build_request: analyze_request,
            merge_response: merge_analysis,
        }
    }

    /// `POST {query, action?, search_results?, urls_to_scrape?}` → `{report, sources?}`.
    pub fn orchestrate(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: "orchestrate",
            endpoint: endpoint.into(),
            method: Method::Post,
            timeout,
            build_request: orchestrate_request,
            merge_response: merge_report,
        }
    }

    /// `POST {query}` → `{report, sources?}`; search and analysis run server-side.
    pub fn combined(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: "analyze",
            endpoint: endpoint.into(),
            method: Method::Post,
            timeout,
            build_request: query_only_request,
            merge_response: merge_report,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A named, ordered, non-empty list of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a custom pipeline. Rejects an empty stage list.
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(GraphRagError::validation("pipeline has no stages"));
        }
        Ok(Self {
            name: name.into(),
            stages,
        })
    }

    /// Single call to the combined analyze endpoint.
    pub fn combined(endpoints: &EndpointsConfig, report_timeout: Duration) -> Self {
        Self {
            name: PipelineShape::Combined.to_string(),
            stages: vec![Stage::combined(&endpoints.analyze, Some(report_timeout))],
        }
    }

    /// search → analyze → orchestrate, threaded client-side.
    pub fn decomposed(
        endpoints: &EndpointsConfig,
        stage_timeout: Option<Duration>,
        report_timeout: Duration,
    ) -> Self {
        Self {
            name: PipelineShape::Decomposed.to_string(),
            stages: vec![
                Stage::search(&endpoints.search, stage_timeout),
                Stage::analyze(&endpoints.analyze, stage_timeout),
                Stage::orchestrate(&endpoints.orchestrate, Some(report_timeout)),
            ],
        }
    }

    /// The pipeline selected by `config.shape`.
    pub fn from_config(config: &ClientConfig) -> Self {
        match config.shape {
            PipelineShape::Combined => Self::combined(&config.endpoints, config.report_timeout),
            PipelineShape::Decomposed => Self::decomposed(
                &config.endpoints,
                config.stage_timeout,
                config.report_timeout,
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

fn query_only_request(ctx: &RunContext) -> Value {
    json!({ "query": ctx.query.as_str() })
}

fn analyze_request(ctx: &RunContext) -> Value {
    let mut body = Map::new();
    body.insert("query".into(), Value::from(ctx.query.as_str()));
    if let Some(results) = &ctx.search_results {
        body.insert("results".into(), Value::Array(results.clone()));
    }
    Value::Object(body)
}

fn orchestrate_request(ctx: &RunContext) -> Value {
    let mut body = Map::new();
    body.insert("query".into(), Value::from(ctx.query.as_str()));
    if let Some(action) = &ctx.action {
        body.insert("action".into(), Value::from(action.as_str()));
    }
    if let Some(results) = &ctx.search_results {
        body.insert("search_results".into(), Value::Array(results.clone()));
    }
    if let Some(urls) = &ctx.urls_to_scrape {
        body.insert("urls_to_scrape".into(), Value::Array(urls.clone()));
    }
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Response mergers
// ---------------------------------------------------------------------------

fn merge_search(mut ctx: RunContext, response: &Value) -> std::result::Result<RunContext, StageError> {
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| StageError::missing("results"))?;
    ctx.search_results = Some(results.clone());
    Ok(ctx)
}

fn merge_analysis(
    mut ctx: RunContext,
    response: &Value,
) -> std::result::Result<RunContext, StageError> {
    let action = response
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| StageError::missing("action"))?;
    ctx.action = Some(action.to_string());
    ctx.urls_to_scrape = response
        .get("details")
        .and_then(|d| d.get("urls_to_scrape"))
        .and_then(Value::as_array)
        .cloned();
    Ok(ctx)
}

/// Accepts `{report, sources?, action?}`.
///
/// Report services answer some failures with a 2xx `{status: "error", error}`
/// body whose `report` is canned failure text; that is a server error.
fn merge_report(mut ctx: RunContext, response: &Value) -> std::result::Result<RunContext, StageError> {
    if response.get("status").and_then(Value::as_str) == Some("error") {
        let detail = response
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("report generation failed");
        return Err(StageError::ServerError {
            status: 200,
            detail: detail.to_string(),
        });
    }

    let report = response
        .get("report")
        .and_then(Value::as_str)
        .ok_or_else(|| StageError::missing("report"))?;
    ctx.report = Some(report.to_string());
    ctx.source_stats = response
        .get("sources")
        .filter(|s| s.is_object())
        .and_then(|s| serde_json::from_value::<SourceStats>(s.clone()).ok());
    if let Some(action) = response.get("action").and_then(Value::as_str) {
        ctx.action = Some(action.to_string());
    }
    Ok(ctx)
}
