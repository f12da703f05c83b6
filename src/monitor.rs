//! Monitor loop: keeps an IMAP session, polls the unread count and tells
//! the controller which color to show.
//!
//! Each iteration either succeeds ([`Tick::Ready`], next poll after the
//! short cadence) or fails ([`Tick::Backoff`], session dropped, cube
//! pushed OFF, next attempt after the long backoff). The wait between
//! iterations is raced against the shutdown signal so a 60 second backoff
//! never delays exit. A poll cut short by shutdown leaves its session
//! half-used, so that session is dropped without a LOGOUT; any other
//! LOGOUT is bounded by [`LOGOUT_TIMEOUT`].
//!
//! ## Rust concepts
//! - Generic struct over a trait with an associated `Session` type
//! - `Option::take()` to move a session out before consuming it
//! - `tokio::select!` to race a sleep against shutdown
//! - `tokio::pin!` so a future can be polled repeatedly by reference

use crate::controller::ControllerHandle;
use crate::mail::{ConnectionError, MailConnector, MailSession, QueryError, unread_total};
use crate::palette::Palette;
use crate::retry::{Pacing, Tick};
use crate::signal::{SignalState, Thresholds};
use std::future::Future;
use std::time::Duration;

/// Longest wait for the server to acknowledge LOGOUT.
pub const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the monitor watches and how counts map to colors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Watch {
    /// Server address, used for log output only.
    pub addr: String,
    pub label: String,
    pub thresholds: Thresholds,
}

pub struct Monitor<C: MailConnector> {
    connector: C,
    watch: Watch,
    controller: ControllerHandle,
    palette: Palette,
    session: Option<C::Session>,
    last_count: Option<u32>,
    failures: u32,
}

impl<C: MailConnector> Monitor<C> {
    pub fn new(connector: C, watch: Watch, controller: ControllerHandle, palette: Palette) -> Self {
        Self {
            connector,
            watch,
            controller,
            palette,
            session: None,
            last_count: None,
            failures: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    #[cfg(test)]
    fn last_count(&self) -> Option<u32> {
        self.last_count
    }

    /// Failed iterations in a row; reset by any successful poll.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Dial, secure and log in. Nothing is kept on failure.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        let session = self.connector.connect().await?;
        self.session = Some(session);
        Ok(())
    }

    /// Unseen messages in the watched mailbox, summed over all records.
    pub async fn query_unread_count(&mut self) -> Result<u32, QueryError> {
        let session = self.session.as_mut().ok_or(QueryError::NotConnected)?;
        let statuses = session.status(&self.watch.label).await?;
        Ok(unread_total(&statuses))
    }

    /// Push OFF, then log out of the current session if there is one.
    pub async fn disconnect(&mut self) {
        self.controller.set_state(SignalState::Off);
        if let Some(session) = self.session.take() {
            if tokio::time::timeout(LOGOUT_TIMEOUT, session.logout())
                .await
                .is_err()
            {
                tracing::warn!(addr = %self.watch.addr, "no answer to LOGOUT after {LOGOUT_TIMEOUT:?}");
            }
            tracing::debug!(addr = %self.watch.addr, "disconnected");
        }
    }

    /// Drop a session whose last command never finished. The server's
    /// reply to it may still be in flight, so no LOGOUT is sent.
    fn abandon_session(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(addr = %self.watch.addr, "dropped interrupted session");
        }
    }

    /// Remember `count`; returns `true` (and logs) only when it changed.
    pub fn observe_count(&mut self, count: u32) -> bool {
        if self.last_count == Some(count) {
            return false;
        }
        self.last_count = Some(count);
        tracing::info!(
            unread = count,
            mailbox = %self.watch.label,
            "You've got {} unread message(s)!",
            self.palette.count(count)
        );
        true
    }

    /// One poll: connect if needed, query, update the controller.
    pub async fn run_once(&mut self) -> Tick {
        if !self.is_connected() {
            tracing::info!(addr = %self.watch.addr, "Connecting to {}...", self.watch.addr);
            if let Err(err) = self.connect().await {
                tracing::error!(addr = %self.watch.addr, error = %err, "connection failed");
                return self.fail().await;
            }
            tracing::info!(addr = %self.watch.addr, "Connected!");
        }

        let count = match self.query_unread_count().await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(mailbox = %self.watch.label, error = %err, "unread count query failed");
                return self.fail().await;
            }
        };

        self.failures = 0;
        self.observe_count(count);
        self.controller.set_state(self.watch.thresholds.signal_for(count));
        Tick::Ready
    }

    async fn fail(&mut self) -> Tick {
        self.failures = self.failures.saturating_add(1);
        self.disconnect().await;
        Tick::Backoff
    }
}

/// Poll until `shutdown` resolves, then hand the monitor back so the
/// caller can disconnect it after the controller is closed.
pub async fn run_monitor<C, F>(mut monitor: Monitor<C>, pacing: Pacing, shutdown: F) -> Monitor<C>
where
    C: MailConnector,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        let tick = tokio::select! {
            () = &mut shutdown => {
                monitor.abandon_session();
                return monitor;
            }
            tick = monitor.run_once() => tick,
        };

        let delay = pacing.delay_after(tick, monitor.consecutive_failures());
        if tick == Tick::Backoff {
            tracing::warn!(
                failures = monitor.consecutive_failures(),
                "Will now sleep for {delay:?}"
            );
        }

        tokio::select! {
            () = &mut shutdown => return monitor,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
