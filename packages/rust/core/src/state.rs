//! Observable UI state and its transitions.
//!
//! `Idle --submit--> Running --resolve--> Resolved --close--> Idle`, and
//! `Resolved --submit--> Running`. Each transition replaces the state as a
//! whole; a transition that does not apply leaves it untouched.

use chrono::{DateTime, Utc};
use tracing::debug;

use graphrag_shared::{FailureKind, PipelineOutcome, Query, Report, RunId, SourceStats};

/// Where the current (or last) run stands.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Running {
        run_id: RunId,
        /// The submitted query, shown as the pending title.
        title: String,
        /// Report of the previous run, kept on screen until this run resolves.
        previous: Option<Report>,
    },
    Resolved {
        run_id: RunId,
        resolution: Resolution,
        resolved_at: DateTime<Utc>,
    },
}

/// How a run ended, as presented to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Report(Report),
    Error {
        title: String,
        /// Report-panel body embedding the message.
        content: String,
        message: String,
        failure: FailureKind,
    },
}

/// Ticket for a run the state machine has accepted.
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: RunId,
    pub query: Query,
}

/// The full observable UI state.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Current contents of the query input.
    pub input: String,
    phase: Phase,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            input: String::new(),
            phase: Phase::Idle,
        }
    }
}

impl UiState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// Id of the in-flight run, if any.
    pub fn running_run_id(&self) -> Option<RunId> {
        match self.phase {
            Phase::Running { run_id, .. } => Some(run_id),
            _ => None,
        }
    }

    pub fn title(&self) -> &str {
        match &self.phase {
            Phase::Idle => "",
            Phase::Running { title, .. } => title,
            Phase::Resolved { resolution, .. } => match resolution {
                Resolution::Report(report) => &report.title,
                Resolution::Error { title, .. } => title,
            },
        }
    }

    /// Body of the report panel.
    pub fn content(&self) -> &str {
        match &self.phase {
            Phase::Idle => "",
            Phase::Running { previous, .. } => {
                previous.as_ref().map_or("", |r| r.content.as_str())
            }
            Phase::Resolved { resolution, .. } => match resolution {
                Resolution::Report(report) => &report.content,
                Resolution::Error { content, .. } => content,
            },
        }
    }

    pub fn source_stats(&self) -> Option<&SourceStats> {
        match &self.phase {
            Phase::Running {
                previous: Some(report),
                ..
            }
            | Phase::Resolved {
                resolution: Resolution::Report(report),
                ..
            } => report.source_stats.as_ref(),
            _ => None,
        }
    }

    /// Banner text when the last run failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Resolved {
                resolution: Resolution::Error { message, .. },
                ..
            } => Some(message),
            _ => None,
        }
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            Phase::Resolved { resolved_at, .. } => Some(resolved_at),
            _ => None,
        }
    }

    /// The close control is only live for a resolved run.
    pub fn can_close(&self) -> bool {
        matches!(self.phase, Phase::Resolved { .. })
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Start a run for `text`.
    ///
    /// Returns `None` and leaves the state untouched while a run is in
    /// flight or when `text` is blank.
    pub fn submit(&mut self, text: &str) -> Option<RunTicket> {
        if self.is_loading() {
            debug!("submit ignored, a run is already in flight");
            return None;
        }
        let query = Query::new(text).ok()?;

        let previous = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Resolved {
                resolution: Resolution::Report(report),
                ..
            } => Some(report),
            _ => None,
        };

        let run_id = RunId::new();
        self.phase = Phase::Running {
            run_id,
            title: query.as_str().to_string(),
            previous,
        };
        Some(RunTicket { run_id, query })
    }

    /// Apply the outcome of run `run_id`.
    ///
    /// Outcomes for any run other than the one in flight are discarded.
    pub fn resolve(
        &mut self,
        run_id: RunId,
        outcome: PipelineOutcome,
        resolved_at: DateTime<Utc>,
    ) -> bool {
        let title = match &self.phase {
            Phase::Running {
                run_id: current,
                title,
                ..
            } if *current == run_id => title.clone(),
            _ => {
                debug!(%run_id, "discarding outcome of a run that is no longer current");
                return false;
            }
        };

        let resolution = match outcome {
            PipelineOutcome::Report(report) => Resolution::Report(report),
            PipelineOutcome::Error { message, kind } => Resolution::Error {
                content: error_report_body(&message),
                title,
                message,
                failure: kind,
            },
        };

        self.phase = Phase::Resolved {
            run_id,
            resolution,
            resolved_at,
        };
        true
    }

    /// Dismiss a resolved report. Refused while a run is in flight.
    pub fn close(&mut self) -> bool {
        if !self.can_close() {
            return false;
        }
        self.phase = Phase::Idle;
        self.input.clear();
        true
    }
}

/// Report-panel body shown when a run fails.
fn error_report_body(message: &str) -> String {
    format!("## Error\n\n{message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(title: &str, content: &str) -> PipelineOutcome {
        PipelineOutcome::Report(Report {
            title: title.into(),
            content: content.into(),
            source_stats: Some(SourceStats {
                search_results_count: 1,
                ..SourceStats::default()
            }),
        })
    }

    fn failure(message: &str) -> PipelineOutcome {
        PipelineOutcome::Error {
            message: message.into(),
            kind: FailureKind::Network,
        }
    }

    #[test]
    fn starts_idle_and_empty() {
        let s = UiState::default();
        assert_eq!(s.phase(), &Phase::Idle);
        assert_eq!(s.title(), "");
        assert_eq!(s.content(), "");
        assert!(!s.is_loading());
        assert!(!s.can_close());
    }

    #[test]
    fn blank_submit_is_a_no_op() {
        let mut s = UiState::default();
        assert!(s.submit("   ").is_none());
        assert_eq!(s, UiState::default());
    }

    #[test]
    fn submit_enters_running_with_pending_title() {
        let mut s = UiState::default();
        let ticket = s.submit("what is neo4j").unwrap();
        assert!(s.is_loading());
        assert_eq!(s.title(), "what is neo4j");
        assert_eq!(s.running_run_id(), Some(ticket.run_id));
        assert_eq!(ticket.query.as_str(), "what is neo4j");
    }

    #[test]
    fn second_submit_while_running_changes_nothing() {
        let mut s = UiState::default();
        s.submit("first").unwrap();
        let before = s.clone();
        assert!(s.submit("second").is_none());
        assert_eq!(s, before);
    }

    #[test]
    fn success_stores_report_exactly() {
        let mut s = UiState::default();
        let t = s.submit("q").unwrap();
        assert!(s.resolve(t.run_id, report("q", "# Body\n"), Utc::now()));
        assert_eq!(s.title(), "q");
        assert_eq!(s.content(), "# Body\n");
        assert_eq!(s.source_stats().map(|st| st.search_results_count), Some(1));
        assert!(s.error_message().is_none());
        assert!(!s.is_loading());
        assert!(s.resolved_at().is_some());
    }

    #[test]
    fn failure_sets_banner_and_synthetic_body() {
        let mut s = UiState::default();
        let t = s.submit("q").unwrap();
        assert!(s.resolve(t.run_id, failure("could not reach the server"), Utc::now()));
        assert_eq!(s.error_message(), Some("could not reach the server"));
        assert_eq!(s.title(), "q");
        assert!(s.content().contains("could not reach the server"));
        assert!(s.source_stats().is_none());
    }

    #[test]
    fn previous_report_stays_visible_while_next_run_loads() {
        let mut s = UiState::default();
        let t = s.submit("q1").unwrap();
        s.resolve(t.run_id, report("q1", "old"), Utc::now());

        s.submit("q2").unwrap();
        assert!(s.is_loading());
        assert_eq!(s.title(), "q2");
        assert_eq!(s.content(), "old");
        assert!(s.error_message().is_none());
    }

    #[test]
    fn resubmit_after_error_clears_the_error() {
        let mut s = UiState::default();
        let t = s.submit("q1").unwrap();
        s.resolve(t.run_id, failure("boom"), Utc::now());

        s.submit("q2").unwrap();
        assert!(s.error_message().is_none());
        assert_eq!(s.content(), "");
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let mut s = UiState::default();
        let stale = s.submit("q1").unwrap();
        s.resolve(stale.run_id, failure("late"), Utc::now());
        let current = s.submit("q2").unwrap();

        assert!(!s.resolve(stale.run_id, report("q1", "stale"), Utc::now()));
        assert_eq!(s.running_run_id(), Some(current.run_id));

        assert!(s.resolve(current.run_id, report("q2", "fresh"), Utc::now()));
        assert!(!s.resolve(current.run_id, report("q2", "again"), Utc::now()));
        assert_eq!(s.content(), "fresh");
    }

    #[test]
    fn close_is_refused_while_running() {
        let mut s = UiState::default();
        s.submit("q").unwrap();
        assert!(!s.close());
        assert!(s.is_loading());
    }

    #[test]
    fn close_resets_to_idle_and_clears_input() {
        let mut s = UiState::default();
        s.input = "q".into();
        let t = s.submit("q").unwrap();
        s.resolve(t.run_id, report("q", "body"), Utc::now());

        assert!(s.close());
        assert_eq!(s, UiState::default());
    }

    #[test]
    fn close_then_resubmit_shows_no_prior_content() {
        let mut s = UiState::default();
        let t = s.submit("q1").unwrap();
        s.resolve(t.run_id, report("q1", "old"), Utc::now());
        s.close();

        s.submit("q2").unwrap();
        assert_eq!(s.title(), "q2");
        assert_eq!(s.content(), "");
        assert!(s.source_stats().is_none());
    }
}
