//! "Settings" screen: resolved client configuration and a health probe.

use crossterm::event::{KeyCode, KeyModifiers};
use graphrag_shared::ClientConfig;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthStatus {
    Unknown,
    Checking,
    Healthy(String),
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettingsAction {
    None,
    CheckHealth,
}

pub(crate) struct SettingsScreen {
    config: ClientConfig,
    health: HealthStatus,
}

impl SettingsScreen {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            config,
            health: HealthStatus::Unknown,
        }
    }

    pub(crate) fn set_health(&mut self, health: HealthStatus) {
        self.health = health;
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Min(1),    // Config
                Constraint::Length(3), // Health
            ])
            .split(area);

        let c = &self.config;
        let stage_timeout = c
            .stage_timeout
            .map_or_else(|| "none".to_string(), |t| format!("{} ms", t.as_millis()));

        let lines = vec![
            setting("Base URL", c.base_url.to_string()),
            setting("Pipeline shape", c.shape.to_string()),
            setting("Report timeout", format!("{} ms", c.report_timeout.as_millis())),
            setting("Stage timeout", stage_timeout),
            Line::from(""),
            Line::from("Endpoints").style(Style::default().add_modifier(Modifier::BOLD)),
            setting("  search", c.endpoints.search.clone()),
            setting("  analyze", c.endpoints.analyze.clone()),
            setting("  orchestrate", c.endpoints.orchestrate.clone()),
            setting("  health", c.endpoints.health.clone()),
            Line::from(""),
            Line::from("Edit ~/.graphrag/graphrag.toml and restart to change these.")
                .style(Style::default().fg(Color::DarkGray)),
        ];

        let config = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Configuration "),
        );
        f.render_widget(config, chunks[0]);

        let (text, style) = match &self.health {
            HealthStatus::Unknown => (
                "Press 'h' to check the backend.".to_string(),
                Style::default(),
            ),
            HealthStatus::Checking => ("Checking…".to_string(), Style::default().fg(Color::Yellow)),
            HealthStatus::Healthy(body) => (format!("✓ {body}"), Style::default().fg(Color::Green)),
            HealthStatus::Unreachable(err) => (format!("✗ {err}"), Style::default().fg(Color::Red)),
        };
        let health = Paragraph::new(text).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Backend health "),
        );
        f.render_widget(health, chunks[1]);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> SettingsAction {
        match code {
            KeyCode::Char('h') if self.health != HealthStatus::Checking => {
                self.health = HealthStatus::Checking;
                SettingsAction::CheckHealth
            }
            _ => SettingsAction::None,
        }
    }
}

fn setting(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<16}"), Style::default().fg(Color::Cyan)),
        Span::raw(value),
    ])
}
