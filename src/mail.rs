//! The mail side as the monitor sees it: something that can connect,
//! answer mailbox status queries and log out.
//!
//! The real implementation lives in [`crate::imap`]; tests substitute
//! scripted fakes.
//!
//! ## Rust concepts
//! - Traits with `async fn` methods (no boxing needed for generic use)
//! - Associated types tying a connector to its session type

use std::future::Future;

/// One status record returned for a mailbox query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages without the `\Seen` flag, if the server sent it.
    pub unseen: Option<u32>,
}

impl MailboxStatus {
    pub fn unseen(count: u32) -> Self {
        Self {
            unseen: Some(count),
        }
    }
}

/// Sum the unseen counts across every record of one query.
pub fn unread_total(statuses: &[MailboxStatus]) -> u32 {
    statuses
        .iter()
        .filter_map(|status| status.unseen)
        .fold(0u32, u32::saturating_add)
}

// ── Errors ───────────────────────────────────────────────────────────

/// Failure to establish an authenticated session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid server address '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("unable to dial '{addr}': {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("IMAP error: {0}")]
    Protocol(#[from] async_imap::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IMAP server sent no greeting")]
    MissingGreeting,

    #[error("unable to start TLS: {0}")]
    StartTls(#[source] async_imap::error::Error),

    #[error("unable to login: {0}")]
    Auth(#[source] async_imap::error::Error),
}

/// Failure of a mailbox status request on an open session.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("STATUS {label} failed: {source}")]
    Status {
        label: String,
        #[source]
        source: async_imap::error::Error,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("not connected")]
    NotConnected,
}

// ── Collaborator traits ──────────────────────────────────────────────

/// Dials the server and authenticates, producing a session.
pub trait MailConnector {
    type Session: MailSession;

    fn connect(&self) -> impl Future<Output = Result<Self::Session, ConnectionError>>;
}

/// An authenticated session.
pub trait MailSession {
    /// Status records for `label`. Zero, one or many are all valid.
    fn status(
        &mut self,
        label: &str,
    ) -> impl Future<Output = Result<Vec<MailboxStatus>, QueryError>>;

    /// End the session without expunging. Best effort.
    fn logout(self) -> impl Future<Output = ()>;
}
