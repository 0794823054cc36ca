//! Core TUI application state and event loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use graphrag_core::{Pipeline, ProgressReporter, Session, UiState};
use graphrag_shared::{AppConfig, ClientConfig, PipelineOutcome, Query, RunId};
use graphrag_transport::HttpTransport;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::screens::{
    AskAction, AskScreen, HealthStatus, ScreenId, SettingsAction, SettingsScreen,
};
use crate::widgets::status_bar;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages from background tasks to the event loop.
enum AppEvent {
    Status(String),
    Health(HealthStatus),
}

/// Application state.
pub(crate) struct App {
    /// Currently active screen tab.
    active_tab: usize,
    /// Whether the app should quit.
    should_quit: bool,
    /// Status message shown in bottom bar.
    status: String,
    /// Whether help overlay is visible.
    show_help: bool,
    ask: AskScreen,
    settings: SettingsScreen,
    session: Session<HttpTransport>,
    /// Last state snapshot received from the session.
    state: UiState,
    state_rx: watch::Receiver<UiState>,
    transport: HttpTransport,
    health_endpoint: String,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub(crate) fn new(client: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&client)?;
        let pipeline = Pipeline::from_config(&client);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Session::new(pipeline, transport.clone()).with_progress(Arc::new(
            ChannelProgress {
                tx: events_tx.clone(),
            },
        ));
        let state_rx = session.subscribe();

        Ok(Self {
            active_tab: 0,
            should_quit: false,
            status: format!("Ready ({} pipeline) · F1 for help", session.pipeline().name()),
            show_help: false,
            ask: AskScreen::new(),
            health_endpoint: client.endpoints.health.clone(),
            settings: SettingsScreen::new(client),
            state: session.snapshot(),
            session,
            state_rx,
            transport,
            events_tx,
            events_rx,
        })
    }

    fn current_screen(&self) -> ScreenId {
        ScreenId::ALL[self.active_tab]
    }

    /// Pull in everything background tasks produced since the last frame.
    fn sync(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Status(msg) => self.status = msg,
                AppEvent::Health(health) => self.settings.set_health(health),
            }
        }

        if self.state_rx.has_changed().unwrap_or(false) {
            self.state = self.state_rx.borrow_and_update().clone();
            self.ask.on_state(&self.state);
        }
    }

    fn apply_ask(&mut self, action: AskAction) {
        match action {
            AskAction::None => {}
            AskAction::SetInput(text) => self.session.set_input(text),
            AskAction::Submit(text) => {
                if let Some(handle) = self.session.submit(&text) {
                    info!(run_id = %handle.run_id(), "query submitted from tui");
                    self.status = "Submitting…".to_string();
                }
            }
            AskAction::Close => {
                if self.session.close() {
                    self.status = "Report closed".to_string();
                }
            }
        }
    }

    fn apply_settings(&mut self, action: SettingsAction) {
        match action {
            SettingsAction::None => {}
            SettingsAction::CheckHealth => {
                let transport = self.transport.clone();
                let endpoint = self.health_endpoint.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let health = match transport.health(&endpoint, HEALTH_TIMEOUT).await {
                        Ok(body) => HealthStatus::Healthy(body.to_string()),
                        Err(e) => HealthStatus::Unreachable(e.to_string()),
                    };
                    let _ = tx.send(AppEvent::Health(health));
                });
            }
        }
    }
}

/// Forwards pipeline progress to the status bar.
struct ChannelProgress {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelProgress {
    fn status(&self, msg: String) {
        // The receiver only goes away when the app is quitting.
        let _ = self.tx.send(AppEvent::Status(msg));
    }
}

impl ProgressReporter for ChannelProgress {
    fn run_started(&self, _run_id: RunId, query: &Query, pipeline: &str) {
        self.status(format!("Asking \"{query}\" ({pipeline})"));
    }

    fn stage_started(&self, stage: &str, current: usize, total: usize) {
        self.status(format!("[{current}/{total}] {stage}…"));
    }

    fn stage_completed(&self, stage: &str, current: usize, total: usize, elapsed: Duration) {
        debug!(stage, current, total, elapsed_ms = elapsed.as_millis(), "stage done");
    }

    fn done(&self, outcome: &PipelineOutcome) {
        let msg = match outcome {
            PipelineOutcome::Report(_) => "Report ready".to_string(),
            PipelineOutcome::Error { message, .. } => format!("Run failed: {message}"),
        };
        self.status(msg);
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(config: AppConfig) -> Result<()> {
    // Fail on bad config before the terminal is taken over.
    let client = ClientConfig::try_from(&config)?;
    let mut app = App::new(client)?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.sync();
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout so background updates show up
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        KeyCode::F(1) => {
            app.show_help = !app.show_help;
            return;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.active_tab = (app.active_tab + 1) % ScreenId::ALL.len();
            app.status = app.current_screen().to_string();
            return;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Delegate to current screen
    match app.current_screen() {
        ScreenId::Ask => {
            let action = app.ask.handle_key(code, modifiers, &app.state);
            app.apply_ask(action);
        }
        ScreenId::Settings => {
            let action = app.settings.handle_key(code, modifiers);
            app.apply_settings(action);
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = ScreenId::ALL
        .iter()
        .map(|s| Line::from(s.to_string()))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(" GraphRAG "))
        .select(app.active_tab)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    match app.current_screen() {
        ScreenId::Ask => app.ask.draw(f, chunks[1], &app.state),
        ScreenId::Settings => app.settings.draw(f, chunks[1]),
    }

    // Status bar
    let bar = status_bar(&app.status, app.state.is_loading());
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  Tab          Switch screen"),
        Line::from("  F1           Toggle this help"),
        Line::from("  Ctrl-C       Quit"),
        Line::from(""),
        Line::from("Ask:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Enter        Submit the query"),
        Line::from("  Esc          Close the report (not while running)"),
        Line::from("  ↑/↓          Scroll one line"),
        Line::from("  PgUp/PgDn    Scroll one page"),
        Line::from(""),
        Line::from("Settings:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  h            Check backend health"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help · press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
