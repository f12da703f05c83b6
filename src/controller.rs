//! Controller thread: owns the cube and keeps rendering the desired state.
//!
//! The monitor never touches the hardware. It writes the color it wants
//! into a [`DesiredState`] through a [`ControllerHandle`], and a dedicated
//! render thread reads that value once per iteration and blinks the cube
//! accordingly. Only the latest value matters; intermediate states written
//! between two renders are simply never shown.
//!
//! ## Shutdown handshake
//! [`Controller::spawn`] creates a one-shot channel. The render thread owns
//! the sender and fires it exactly once, after the cube has been switched
//! off and closed. [`Controller::close`] consumes the controller, so the
//! receiver can only be awaited once.
//!
//! ## Rust concepts
//! - `Mutex` wrapped in a type that only exposes three operations
//! - `Arc` to share that type between the monitor and the render thread
//! - `tokio::sync::oneshot` bridging a plain thread and async code
//! - Generic parameters for the device and the clock, so tests need
//!   neither hardware nor real time

use crate::device::{Device, DeviceOpener};
use crate::palette::Palette;
use crate::retry::{ControllerTiming, Sleeper};
use crate::signal::SignalState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

// ── Shared state ─────────────────────────────────────────────────────

/// What one read of the shared state returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub state: SignalState,
    pub terminating: bool,
}

/// The only data shared between the monitor and the render thread.
///
/// The lock is held just long enough to copy or replace the two fields,
/// never across a device call or a sleep.
#[derive(Debug, Default)]
pub struct DesiredState {
    inner: Mutex<Snapshot>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // Two plain Copy fields cannot be left half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the desired color. Returns `true` if it changed.
    pub fn set_desired(&self, state: SignalState) -> bool {
        let mut inner = self.lock();
        let changed = inner.state != state;
        inner.state = state;
        changed
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.lock()
    }

    /// Ask the render thread to switch off, close the device and exit.
    pub fn request_termination(&self) {
        self.lock().terminating = true;
    }
}

// ── Handle ───────────────────────────────────────────────────────────

/// Cheap, cloneable writer for the desired state.
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    shared: Arc<DesiredState>,
    palette: Palette,
}

impl ControllerHandle {
    pub fn new(shared: Arc<DesiredState>, palette: Palette) -> Self {
        Self { shared, palette }
    }

    /// Set the color to render. Never blocks on the hardware.
    pub fn set_state(&self, state: SignalState) {
        if self.shared.set_desired(state) {
            tracing::info!(state = %state, "Cube is now {}", self.palette.state(state));
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> SignalState {
        self.shared.snapshot().state
    }
}

// ── Controller ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("failed to spawn the render thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("render thread exited without confirming shutdown")]
    Gone,
}

/// Owner of the render thread and its completion signal.
#[derive(Debug)]
pub struct Controller {
    handle: ControllerHandle,
    done: oneshot::Receiver<()>,
}

impl Controller {
    /// Start the render thread. The device is opened lazily by that thread.
    pub fn spawn<O, S>(
        opener: O,
        timing: ControllerTiming,
        sleeper: S,
        palette: Palette,
    ) -> Result<Self, ControllerError>
    where
        O: DeviceOpener,
        S: Sleeper + 'static,
    {
        let shared = Arc::new(DesiredState::new());
        let (done_tx, done_rx) = oneshot::channel();

        let render = RenderLoop::new(opener, shared.clone(), timing, sleeper);
        thread::Builder::new()
            .name("cube-render".to_string())
            .spawn(move || render.run(done_tx))
            .map_err(ControllerError::Spawn)?;

        Ok(Self {
            handle: ControllerHandle::new(shared, palette),
            done: done_rx,
        })
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Switch the cube off and wait until the render thread confirms that
    /// the device is off and closed.
    pub async fn close(self) -> Result<(), ControllerError> {
        self.handle.set_state(SignalState::Off);
        self.handle.shared.request_termination();
        self.done.await.map_err(|_| ControllerError::Gone)
    }
}

// ── Render loop ──────────────────────────────────────────────────────

/// What one render iteration decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Terminated,
}

pub(crate) struct RenderLoop<O: DeviceOpener, S> {
    opener: O,
    device: Option<O::Device>,
    shared: Arc<DesiredState>,
    timing: ControllerTiming,
    sleeper: S,
    open_failures: u32,
}

impl<O: DeviceOpener, S: Sleeper> RenderLoop<O, S> {
    pub(crate) fn new(
        opener: O,
        shared: Arc<DesiredState>,
        timing: ControllerTiming,
        sleeper: S,
    ) -> Self {
        Self {
            opener,
            device: None,
            shared,
            timing,
            sleeper,
            open_failures: 0,
        }
    }

    /// Runs until termination is requested, then fires `done`.
    pub(crate) fn run(mut self, done: oneshot::Sender<()>) {
        tracing::debug!("render thread started");
        while self.step() == Step::Continue {}
        tracing::debug!("render thread finished");
        // The receiver is gone only if the controller was dropped unclosed.
        let _ = done.send(());
    }

    pub(crate) fn step(&mut self) -> Step {
        let snapshot = self.shared.snapshot();
        if snapshot.terminating {
            self.shut_down();
            return Step::Terminated;
        }

        match self.device.as_mut() {
            Some(device) => {
                render(device, snapshot.state, &self.timing, &self.sleeper);
            }
            None => self.try_open(),
        }
        Step::Continue
    }

    fn try_open(&mut self) {
        match self.opener.open() {
            Ok(device) => {
                tracing::info!(attempts = self.open_failures + 1, "Cube connected");
                self.open_failures = 0;
                self.device = Some(device);
            }
            Err(err) => {
                self.open_failures = self.open_failures.saturating_add(1);
                let delay = self.timing.open_retry.delay(self.open_failures);
                if self.open_failures == 1 {
                    tracing::warn!(error = %err, retry_in = ?delay, "cube unavailable, will keep retrying");
                } else {
                    tracing::debug!(error = %err, attempt = self.open_failures, "cube still unavailable");
                }
                self.wait_before_retry(delay);
            }
        }
    }

    /// Sleep through the open backoff one blink at a time so a termination
    /// request is noticed within one blink, not one full retry interval.
    fn wait_before_retry(&self, delay: Duration) {
        let slice = self.timing.blink.max(Duration::from_millis(1));
        let mut remaining = delay;
        while !remaining.is_zero() && !self.shared.snapshot().terminating {
            let nap = remaining.min(slice);
            self.sleeper.sleep(nap);
            remaining -= nap;
        }
    }

    fn shut_down(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.off();
            device.close();
            tracing::debug!("cube switched off and closed");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.device.is_some()
    }
}

/// One blink cycle for a color, one steady beat for OFF.
fn render<D: Device, S: Sleeper>(
    device: &mut D,
    state: SignalState,
    timing: &ControllerTiming,
    sleeper: &S,
) {
    match state {
        SignalState::Green | SignalState::Red => {
            device.show(state);
            sleeper.sleep(timing.blink);
            device.off();
            sleeper.sleep(timing.blink);
        }
        SignalState::Off => {
            device.off();
            sleeper.sleep(timing.blink);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
