//! Per-run accumulated state threaded between stages.

use chrono::{DateTime, Utc};
use serde_json::Value;

use graphrag_shared::{Query, RunId, SourceStats};

/// Everything one run has learned so far.
///
/// Owned by exactly one in-flight run and dropped when the run ends.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identity of the run this context belongs to.
    pub run_id: RunId,
    /// The submitted query.
    pub query: Query,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// Raw search results from the search stage.
    pub search_results: Option<Vec<Value>>,
    /// Action classified by the analysis stage (e.g. `scrape_and_extract`).
    pub action: Option<String>,
    /// URLs the analysis stage wants fetched before reporting.
    pub urls_to_scrape: Option<Vec<Value>>,
    /// Report markdown from the report-producing stage.
    pub report: Option<String>,
    pub source_stats: Option<SourceStats>,
    /// Stage currently executing, if any.
    pub current_stage: Option<&'static str>,
    /// Stages merged so far, in order.
    pub completed_stages: Vec<&'static str>,
}

impl RunContext {
    /// Fresh context for a new run.
    pub fn new(query: Query) -> Self {
        Self::with_run_id(RunId::new(), query)
    }

    /// Fresh context under an already allocated run id.
    pub fn with_run_id(run_id: RunId, query: Query) -> Self {
        Self {
            run_id,
            query,
            started_at: Utc::now(),
            search_results: None,
            action: None,
            urls_to_scrape: None,
            report: None,
            source_stats: None,
            current_stage: None,
            completed_stages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_carries_only_the_query() {
        let ctx = RunContext::new(Query::new("what is graph-rag").unwrap());
        assert_eq!(ctx.query.as_str(), "what is graph-rag");
        assert!(ctx.search_results.is_none());
        assert!(ctx.action.is_none());
        assert!(ctx.report.is_none());
        assert!(ctx.completed_stages.is_empty());
    }

    #[test]
    fn contexts_get_distinct_run_ids() {
        let q = Query::new("q").unwrap();
        let a = RunContext::new(q.clone());
        let b = RunContext::new(q);
        assert_ne!(a.run_id, b.run_id);
    }
}
