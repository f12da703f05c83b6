//! Watches an IMAP mailbox and blinks an Amperka Cube when mail is waiting.
//!
//! Two long-lived activities cooperate:
//! - the **monitor** ([`monitor`]) polls the unread count once a second
//!   and decides whether the cube should be off, green or red
//! - the **controller** ([`controller`]) owns the cube on its own thread
//!   and keeps blinking whatever color was requested last
//!
//! The [`shutdown`] module ties them together on Ctrl+C / SIGTERM: cube
//! off and closed first, then the IMAP session, then exit.
//!
//! Hardware access sits behind the `hardware` feature (the [`cube`]
//! module); everything else builds and tests on any machine.

pub mod config;
pub mod controller;
#[cfg(feature = "hardware")]
pub mod cube;
pub mod device;
pub mod imap;
pub mod mail;
pub mod monitor;
pub mod palette;
pub mod retry;
pub mod shutdown;
pub mod signal;

#[cfg(test)]
mod fakes;

pub use config::{Config, ConfigError};
pub use controller::{Controller, ControllerHandle};
pub use monitor::{Monitor, Watch, run_monitor};
pub use palette::Palette;
pub use retry::{ControllerTiming, Pacing};
pub use shutdown::{ShutdownSignal, shut_down};
pub use signal::{SignalState, Thresholds};

/// Startup banner.
pub const BANNER: &str = ":: IMAP monitor for Amperka Cube ::";

impl From<&Config> for Watch {
    fn from(config: &Config) -> Self {
        Watch {
            addr: config.addr.clone(),
            label: config.label.clone(),
            thresholds: config.thresholds(),
        }
    }
}
