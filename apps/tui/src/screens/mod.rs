//! TUI screen definitions.
//!
//! Each screen corresponds to a tab in the TUI and owns its view state.
//! Screens never touch the session directly: key handling returns an
//! action that the app applies.

mod ask;
mod settings;

use std::fmt;

pub(crate) use ask::{AskAction, AskScreen};
pub(crate) use settings::{HealthStatus, SettingsAction, SettingsScreen};

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Ask,
    Settings,
}

impl ScreenId {
    pub(crate) const ALL: [ScreenId; 2] = [ScreenId::Ask, ScreenId::Settings];
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "Ask"),
            Self::Settings => write!(f, "Settings"),
        }
    }
}
