//! Scripted mail collaborator shared by the monitor and shutdown tests.

use crate::mail::{ConnectionError, MailConnector, MailSession, MailboxStatus, QueryError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Everything the fake saw, plus what it will answer next.
#[derive(Debug, Default)]
pub struct Script {
    /// Outcome of each `connect`; succeeds once exhausted.
    pub connects: VecDeque<bool>,
    /// Answer to each `status`; an empty list once exhausted.
    pub statuses: VecDeque<Result<Vec<MailboxStatus>, String>>,
    pub connect_calls: u32,
    pub status_calls: u32,
    pub logouts: u32,
    /// When set, `status` and `logout` never complete, like a server that
    /// stopped answering mid-session.
    pub stalled: bool,
    /// Free-form ordering log shared with other fakes.
    pub events: Vec<&'static str>,
}

pub type Shared = Arc<Mutex<Script>>;

#[derive(Clone, Debug, Default)]
pub struct FakeConnector(pub Shared);

impl FakeConnector {
    pub fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.0.lock().unwrap()
    }

    pub fn with_counts(counts: &[u32]) -> Self {
        let connector = Self::default();
        connector.script().statuses = counts
            .iter()
            .map(|count| Ok(vec![MailboxStatus::unseen(*count)]))
            .collect();
        connector
    }
}

pub struct FakeSession(Shared);

impl MailConnector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, ConnectionError> {
        let mut script = self.script();
        script.connect_calls += 1;
        if script.connects.pop_front().unwrap_or(true) {
            script.events.push("connect");
            Ok(FakeSession(self.0.clone()))
        } else {
            Err(ConnectionError::Dial {
                addr: "fake:143".to_string(),
                source: std::io::ErrorKind::ConnectionRefused.into(),
            })
        }
    }
}

impl MailSession for FakeSession {
    async fn status(&mut self, _label: &str) -> Result<Vec<MailboxStatus>, QueryError> {
        let answer = {
            let mut script = self.0.lock().unwrap();
            script.status_calls += 1;
            if script.stalled {
                None
            } else {
                Some(script.statuses.pop_front())
            }
        };
        match answer {
            None => std::future::pending().await,
            Some(Some(Ok(statuses))) => Ok(statuses),
            Some(Some(Err(message))) => Err(QueryError::Rejected(message)),
            Some(None) => Ok(Vec::new()),
        }
    }

    async fn logout(self) {
        let stalled = self.0.lock().unwrap().stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut script = self.0.lock().unwrap();
        script.logouts += 1;
        script.events.push("logout");
    }
}
