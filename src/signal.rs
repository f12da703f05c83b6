//! The indicator colors and the mapping from an unread count to a color.
//!
//! ## Rust concepts
//! - Fieldless `enum` with `#[derive(Default)]` on a variant
//! - `impl Display` so states print as `OFF` / `GREEN` / `RED`

use std::fmt;

// ── Signal state ─────────────────────────────────────────────────────

/// The color the cube should be showing.
///
/// Termination is not a variant here. The controller tracks it with a
/// separate flag so "shutting down" never overwrites the last color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SignalState {
    #[default]
    Off,
    Green,
    Red,
}

impl SignalState {
    /// Upper-case label used in log output.
    pub fn label(self) -> &'static str {
        match self {
            SignalState::Off => "OFF",
            SignalState::Green => "GREEN",
            SignalState::Red => "RED",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Thresholds ───────────────────────────────────────────────────────

/// Unread counts above which the green and red signals switch on.
///
/// The two values are independent. `red_if_more <= green_if_more` is a
/// legal configuration; red still wins because it is checked first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub green_if_more: u32,
    pub red_if_more: u32,
}

impl Thresholds {
    pub fn new(green_if_more: u32, red_if_more: u32) -> Self {
        Self {
            green_if_more,
            red_if_more,
        }
    }

    /// Derive the desired state for `count` unread messages.
    pub fn signal_for(&self, count: u32) -> SignalState {
        if count > self.red_if_more {
            SignalState::Red
        } else if count > self.green_if_more {
            SignalState::Green
        } else {
            SignalState::Off
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
