//! Turning Ctrl+C / SIGTERM into an orderly teardown.
//!
//! Teardown order matters: the cube must be dark and closed before the
//! IMAP session goes away and the process exits.
//!
//! ## Rust concepts
//! - `ctrlc` handler closure that moves a channel sender into it
//! - `tokio::sync::watch` as a level-triggered "stop requested" flag that
//!   any number of waiters can observe

use crate::controller::Controller;
use crate::mail::MailConnector;
use crate::monitor::Monitor;
use tokio::sync::watch;

/// Becomes ready once an interrupt or termination signal arrives.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Requests shutdown programmatically (what the signal handler does).
#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    /// A signal that only fires through the returned trigger.
    pub fn channel() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Self { rx })
    }

    /// Register for SIGINT and SIGTERM. Can only be called once per process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let (trigger, signal) = Self::channel();
        ctrlc::set_handler(move || {
            tracing::debug!("termination signal received");
            trigger.trigger();
        })?;
        Ok(signal)
    }

    #[cfg(test)]
    fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(mut self) {
        // An error means every trigger is gone; nothing can stop us later.
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

/// Close the controller (cube off and closed), then log out of IMAP.
pub async fn shut_down<C: MailConnector>(controller: Controller, mut monitor: Monitor<C>) {
    tracing::info!("Shutting down...");
    if let Err(err) = controller.close().await {
        tracing::error!(error = %err, "cube controller did not shut down cleanly");
    }
    monitor.disconnect().await;
    tracing::info!("Goodbye!");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceOpener, OpenError};
    use crate::fakes::{FakeConnector, Shared};
    use crate::monitor::{Watch, run_monitor};
    use crate::palette::Palette;
    use crate::retry::{ControllerTiming, Pacing, RetryPolicy, ThreadSleeper};
    use crate::signal::{SignalState, Thresholds};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Writes device events into the mail fake's log to check ordering.
    struct LoggingCube(Shared);

    impl Device for LoggingCube {
        fn red(&mut self) {}
        fn green(&mut self) {}
        fn off(&mut self) {
            let mut script = self.0.lock().unwrap();
            if script.events.last() != Some(&"cube off") {
                script.events.push("cube off");
            }
        }
        fn close(self) {
            self.0.lock().unwrap().events.push("cube close");
        }
    }

    struct LoggingOpener(Shared);

    impl DeviceOpener for LoggingOpener {
        type Device = LoggingCube;

        fn open(&mut self) -> Result<LoggingCube, OpenError> {
            Ok(LoggingCube(self.0.clone()))
        }
    }

    fn fast_timing() -> ControllerTiming {
        ControllerTiming {
            blink: Duration::from_millis(1),
            open_retry: RetryPolicy::fixed(Duration::from_millis(1)),
        }
    }

    /// Wait until the render thread has opened the cube and drawn a frame.
    async fn cube_opened(connector: &FakeConnector) {
        for _ in 0..2000 {
            if connector.script().events.contains(&"cube off") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("cube was never opened");
    }

    #[tokio::test]
    async fn signal_fires_after_trigger() {
        let (trigger, signal) = ShutdownSignal::channel();
        assert!(!signal.is_requested());

        trigger.trigger();
        assert!(signal.is_requested());
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn clones_observe_the_same_request() {
        let (trigger, signal) = ShutdownSignal::channel();
        let waiter = tokio::spawn(signal.clone().wait());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_requested());
    }

    #[tokio::test]
    async fn cube_closes_before_mail_logout() {
        let connector = FakeConnector::with_counts(&[50]);
        let controller = Controller::spawn(
            LoggingOpener(connector.0.clone()),
            fast_timing(),
            ThreadSleeper,
            Palette::plain(),
        )
        .unwrap();
        let watch = Watch {
            addr: "fake:143".to_string(),
            label: "INBOX".to_string(),
            thresholds: Thresholds::new(0, 10),
        };
        let mut monitor = Monitor::new(connector.clone(), watch, controller.handle(), Palette::plain());
        monitor.run_once().await;
        assert_eq!(controller.handle().current(), SignalState::Red);
        cube_opened(&connector).await;

        shut_down(controller, monitor).await;

        let events = connector.script().events.clone();
        let close = events.iter().position(|e| *e == "cube close").unwrap();
        let logout = events.iter().position(|e| *e == "logout").unwrap();
        assert!(close < logout, "{events:?}");
        assert_eq!(events.last(), Some(&"logout"));
    }

    #[tokio::test]
    async fn triggered_signal_stops_the_monitor_loop() {
        let connector = FakeConnector::with_counts(&[1; 100]);
        let controller = Controller::spawn(
            LoggingOpener(connector.0.clone()),
            fast_timing(),
            ThreadSleeper,
            Palette::plain(),
        )
        .unwrap();
        let watch = Watch {
            addr: "fake:143".to_string(),
            label: "INBOX".to_string(),
            thresholds: Thresholds::new(0, 10),
        };
        let monitor = Monitor::new(connector.clone(), watch, controller.handle(), Palette::plain());
        let pacing = Pacing::new(Duration::from_millis(5), RetryPolicy::fixed(Duration::from_secs(60)));

        let (trigger, signal) = ShutdownSignal::channel();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.trigger();
        });

        let monitor = tokio::time::timeout(
            Duration::from_secs(5),
            run_monitor(monitor, pacing, signal.wait()),
        )
        .await
        .unwrap();
        stopper.await.unwrap();

        assert!(monitor.is_connected());
        shut_down(controller, monitor).await;
        assert_eq!(connector.script().logouts, 1);
    }
}
