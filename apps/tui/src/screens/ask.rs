//! "Ask" screen: query input, report panel, error banner.

use crossterm::event::{KeyCode, KeyModifiers};
use graphrag_core::{Phase, UiState};
use graphrag_shared::RunId;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::widgets::error_banner;

const PAGE: u16 = 10;

/// What the app should do with the session after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AskAction {
    None,
    SetInput(String),
    Submit(String),
    Close,
}

pub(crate) struct AskScreen {
    scroll: u16,
    /// Run whose report is on screen; scroll resets when it changes.
    shown: Option<RunId>,
}

impl AskScreen {
    pub(crate) fn new() -> Self {
        Self {
            scroll: 0,
            shown: None,
        }
    }

    /// Track a new state snapshot.
    pub(crate) fn on_state(&mut self, state: &UiState) {
        let current = match state.phase() {
            Phase::Idle => None,
            Phase::Running { run_id, .. } | Phase::Resolved { run_id, .. } => Some(*run_id),
        };
        if current != self.shown {
            self.shown = current;
            self.scroll = 0;
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, state: &UiState) {
        let banner_height = if state.error_message().is_some() { 3 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),             // Input
                Constraint::Length(banner_height), // Error banner
                Constraint::Min(1),                // Report
                Constraint::Length(1),             // Sources footer
                Constraint::Length(1),             // Hint
            ])
            .split(area);

        // Input
        let (input_title, input_style) = if state.is_loading() {
            (" Query (running…) ", Style::default().fg(Color::DarkGray))
        } else {
            (" Query ", Style::default().fg(Color::Yellow))
        };
        let input = Paragraph::new(format!("{}▏", state.input)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(input_title)
                .border_style(input_style),
        );
        f.render_widget(input, chunks[0]);

        if let Some(message) = state.error_message() {
            f.render_widget(error_banner(message), chunks[1]);
        }

        // Report
        let report_title = match state.title() {
            "" => " Report ".to_string(),
            title => format!(" {title} "),
        };
        let body = if matches!(state.phase(), Phase::Idle) {
            "Type a question and press Enter.".to_string()
        } else {
            state.content().to_string()
        };
        let report = Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(report_title),
            );
        f.render_widget(report, chunks[2]);

        let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(Color::Gray));
        f.render_widget(footer, chunks[3]);

        let hint = if state.can_close() {
            "Enter to ask · Esc to close the report · ↑/↓ PgUp/PgDn to scroll"
        } else {
            "Enter to ask · ↑/↓ PgUp/PgDn to scroll"
        };
        let hint_p = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(hint_p, chunks[4]);
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        modifiers: KeyModifiers,
        state: &UiState,
    ) -> AskAction {
        match code {
            KeyCode::Enter if state.can_submit() => AskAction::Submit(state.input.clone()),
            KeyCode::Esc if state.can_close() => AskAction::Close,
            KeyCode::Backspace if !state.input.is_empty() => {
                let mut input = state.input.clone();
                input.pop();
                AskAction::SetInput(input)
            }
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                let mut input = state.input.clone();
                input.push(c);
                AskAction::SetInput(input)
            }
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                AskAction::None
            }
            KeyCode::Down => {
                self.scroll_by(1, state);
                AskAction::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(PAGE);
                AskAction::None
            }
            KeyCode::PageDown => {
                self.scroll_by(PAGE, state);
                AskAction::None
            }
            KeyCode::Home => {
                self.scroll = 0;
                AskAction::None
            }
            _ => AskAction::None,
        }
    }

    fn scroll_by(&mut self, lines: u16, state: &UiState) {
        let max = u16::try_from(state.content().lines().count().saturating_sub(1))
            .unwrap_or(u16::MAX);
        self.scroll = self.scroll.saturating_add(lines).min(max);
    }
}

fn footer_text(state: &UiState) -> String {
    let mut parts = Vec::new();
    if let Some(stats) = state.source_stats() {
        parts.push(format!(
            "Sources: {} search results · {} graph entities · {} relationships",
            stats.search_results_count, stats.neo4j_entities, stats.neo4j_relationships
        ));
    }
    if let Some(at) = state.resolved_at() {
        parts.push(format!(
            "resolved {}",
            at.with_timezone(&chrono::Local).format("%H:%M:%S")
        ));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use graphrag_shared::{PipelineOutcome, Report};

    fn resolved(content: &str) -> UiState {
        let mut state = UiState::default();
        let ticket = state.submit("q").unwrap();
        state.resolve(
            ticket.run_id,
            PipelineOutcome::Report(Report {
                title: "q".into(),
                content: content.into(),
                source_stats: None,
            }),
            Utc::now(),
        );
        state
    }

    #[test]
    fn typing_edits_the_input() {
        let mut screen = AskScreen::new();
        let mut state = UiState::default();
        state.input = "ab".into();

        let action = screen.handle_key(KeyCode::Char('c'), KeyModifiers::NONE, &state);
        assert_eq!(action, AskAction::SetInput("abc".into()));

        let action = screen.handle_key(KeyCode::Backspace, KeyModifiers::NONE, &state);
        assert_eq!(action, AskAction::SetInput("a".into()));
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let mut screen = AskScreen::new();
        let mut state = UiState::default();
        state.input = "   ".into();
        assert_eq!(
            screen.handle_key(KeyCode::Enter, KeyModifiers::NONE, &state),
            AskAction::None
        );
    }

    #[test]
    fn esc_closes_only_a_resolved_report() {
        let mut screen = AskScreen::new();
        let mut running = UiState::default();
        running.submit("q").unwrap();
        assert_eq!(
            screen.handle_key(KeyCode::Esc, KeyModifiers::NONE, &running),
            AskAction::None
        );
        assert_eq!(
            screen.handle_key(KeyCode::Esc, KeyModifiers::NONE, &resolved("body")),
            AskAction::Close
        );
    }

    #[test]
    fn scroll_is_clamped_and_reset_by_a_new_run() {
        let mut screen = AskScreen::new();
        let state = resolved("1\n2\n3");
        screen.on_state(&state);

        screen.handle_key(KeyCode::PageDown, KeyModifiers::NONE, &state);
        assert_eq!(screen.scroll, 2);

        let mut next = state.clone();
        next.submit("again").unwrap();
        screen.on_state(&next);
        assert_eq!(screen.scroll, 0);
    }
}
