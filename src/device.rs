//! The indicator hardware as the controller sees it.
//!
//! Opening can fail (cube unplugged, port busy) and is retried by the
//! controller. Color commands on an open device are best effort: they
//! return nothing, and a driver that hits an I/O error logs it and
//! carries on.
//!
//! ## Rust concepts
//! - Traits as the hardware boundary, so the controller can be tested
//!   on any machine with a fake device
//! - `Box<dyn Error + Send + Sync>` for driver-specific failure causes

use crate::signal::SignalState;

/// The cube could not be opened.
#[derive(Debug, thiserror::Error)]
#[error("unable to open cube at '{address}': {source}")]
pub struct OpenError {
    pub address: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl OpenError {
    pub fn new(
        address: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            address: address.into(),
            source: source.into(),
        }
    }
}

/// An open indicator.
pub trait Device {
    fn red(&mut self);
    fn green(&mut self);
    fn off(&mut self);
    fn close(self);

    /// Assert the color for `state`.
    fn show(&mut self, state: SignalState) {
        match state {
            SignalState::Off => self.off(),
            SignalState::Green => self.green(),
            SignalState::Red => self.red(),
        }
    }
}

/// Opens the indicator. Called repeatedly until it succeeds.
pub trait DeviceOpener: Send + 'static {
    type Device: Device + Send;

    fn open(&mut self) -> Result<Self::Device, OpenError>;
}
