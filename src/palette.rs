//! Terminal styling for state transitions and unread counts.
//!
//! A `Palette` is a plain value handed to the controller and the monitor
//! when they are built, so there is no process-wide style state.

use crate::signal::SignalState;
use crossterm::style::{Color, ContentStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
    off: ContentStyle,
    green: ContentStyle,
    red: ContentStyle,
    number: ContentStyle,
}

fn style(foreground: Color, background: Option<Color>) -> ContentStyle {
    ContentStyle {
        foreground_color: Some(foreground),
        background_color: background,
        ..ContentStyle::default()
    }
}

impl Palette {
    /// Black on white for OFF, white on green/red, cyan numbers.
    pub fn colored() -> Self {
        Self {
            enabled: true,
            off: style(Color::Black, Some(Color::White)),
            green: style(Color::White, Some(Color::Green)),
            red: style(Color::White, Some(Color::Red)),
            number: style(Color::Cyan, None),
        }
    }

    /// No escape sequences at all, for journald and log files.
    pub fn plain() -> Self {
        Self {
            enabled: false,
            off: ContentStyle::default(),
            green: ContentStyle::default(),
            red: ContentStyle::default(),
            number: ContentStyle::default(),
        }
    }

    #[cfg(test)]
    fn is_colored(&self) -> bool {
        self.enabled
    }

    fn style_for(&self, state: SignalState) -> ContentStyle {
        match state {
            SignalState::Off => self.off,
            SignalState::Green => self.green,
            SignalState::Red => self.red,
        }
    }

    /// Render a state label, e.g. `GREEN` on a green background.
    pub fn state(&self, state: SignalState) -> String {
        if !self.enabled {
            return state.label().to_string();
        }
        self.style_for(state).apply(state.label()).to_string()
    }

    /// Render an unread count.
    pub fn count(&self, count: u32) -> String {
        if !self.enabled {
            return count.to_string();
        }
        self.number.apply(count).to_string()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::colored()
    }
}
