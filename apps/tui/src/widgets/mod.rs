//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str, busy: bool) -> Paragraph<'_> {
    let marker = if busy { "● " } else { "" };
    Paragraph::new(format!(" {marker}{msg}"))
        .style(
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White),
        )
}

/// Red banner shown above the report when the last run failed.
pub(crate) fn error_banner(message: &str) -> Paragraph<'_> {
    Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White).bg(Color::Red))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error "),
        )
}
