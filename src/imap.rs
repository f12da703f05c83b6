//! IMAP implementation of the mail collaborator, built on `async-imap`.
//!
//! Connection setup follows the address:
//! - port 993: TLS from the first byte (implicit TLS)
//! - any other port: plain TCP, upgraded with STARTTLS when the server
//!   advertises it in its greeting or its CAPABILITY response
//!
//! After the greeting (and optional upgrade) every stream is boxed as a
//! [`ImapStream`] trait object so plain and TLS sessions share one type.

use crate::config::Config;
use crate::mail::{ConnectionError, MailConnector, MailSession, MailboxStatus, QueryError};
use async_imap::imap_proto::{Capability, Response, ResponseCode};
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

/// Port that implies TLS from the first byte.
pub const IMAPS_PORT: u16 = 993;

/// Tag of the CAPABILITY command sent before login. Distinct from the
/// `A0001`-style tags `async-imap` generates.
const CAPABILITY_TAG: &str = "C0";

/// Any byte stream an IMAP session can run over.
pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> ImapStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

type BoxedStream = Box<dyn ImapStream>;

// ── Address ──────────────────────────────────────────────────────────

/// A `host:port` pair taken from the `addr` config key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn parse(addr: &str) -> Result<Self, ConnectionError> {
        let invalid = || ConnectionError::InvalidAddress(addr.to_string());
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn implicit_tls(&self) -> bool {
        self.port == IMAPS_PORT
    }
}

// ── Capabilities ─────────────────────────────────────────────────────

fn has_starttls(caps: &[Capability<'_>]) -> bool {
    caps.iter()
        .any(|cap| matches!(cap, Capability::Atom(name) if name.eq_ignore_ascii_case("STARTTLS")))
}

/// STARTTLS support as announced by a single response, if it carries a
/// capability list at all.
fn advertised_starttls(response: &Response<'_>) -> Option<bool> {
    match response {
        Response::Data {
            code: Some(ResponseCode::Capabilities(caps)),
            ..
        } => Some(has_starttls(caps)),
        Response::Capabilities(caps) => Some(has_starttls(caps)),
        _ => None,
    }
}

async fn read_greeting<T: ImapStream>(
    client: &mut async_imap::Client<T>,
) -> Result<Option<bool>, ConnectionError> {
    let greeting = client
        .read_response()
        .await
        .transpose()?
        .ok_or(ConnectionError::MissingGreeting)?;
    Ok(advertised_starttls(greeting.parsed()))
}

/// Ask for CAPABILITY explicitly when the greeting did not include it.
///
/// `async-imap` only exposes tagged commands that end in a plain OK, so the
/// command is written on the raw socket and its replies are read back
/// through a fresh client. Nothing is buffered past the greeting at this
/// point, so unwrapping the client loses no data.
async fn query_starttls(
    client: async_imap::Client<TcpStream>,
) -> Result<(async_imap::Client<TcpStream>, bool), ConnectionError> {
    let mut tcp_stream = client.into_inner();
    tcp_stream
        .write_all(format!("{CAPABILITY_TAG} CAPABILITY\r\n").as_bytes())
        .await?;
    tcp_stream.flush().await?;

    let mut client = async_imap::Client::new(tcp_stream);
    let mut starttls = false;
    loop {
        let response = client
            .read_response()
            .await
            .transpose()?
            .ok_or_else(|| ConnectionError::Io(std::io::ErrorKind::UnexpectedEof.into()))?;
        match response.parsed() {
            Response::Done { tag, .. } if tag.0 == CAPABILITY_TAG => {
                return Ok((client, starttls));
            }
            parsed => {
                if let Some(found) = advertised_starttls(parsed) {
                    starttls = found;
                }
            }
        }
    }
}

// ── TLS ──────────────────────────────────────────────────────────────

fn tls_connector() -> Result<TlsConnector, ConnectionError> {
    let mut roots = rustls::RootCertStore::empty();
    let rustls_native_certs::CertificateResult { certs, errors, .. } =
        rustls_native_certs::load_native_certs();
    for err in errors {
        tracing::debug!(error = %err, "skipping unreadable root certificate source");
    }
    let (added, ignored) = roots.add_parsable_certificates(certs);
    tracing::debug!(added, ignored, "loaded native root certificates");
    if roots.is_empty() {
        return Err(ConnectionError::Tls(
            "no usable root certificates found".to_string(),
        ));
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| ConnectionError::Tls(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn tls_handshake(
    host: &str,
    tcp_stream: TcpStream,
) -> Result<TlsStream<TcpStream>, ConnectionError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ConnectionError::Tls(format!("invalid DNS name '{host}'")))?;
    let stream = tls_connector()?.connect(server_name, tcp_stream).await?;
    Ok(stream)
}

// ── Connector ────────────────────────────────────────────────────────

/// Connects and logs in with the account from the configuration.
#[derive(Clone)]
pub struct ImapConnector {
    addr: String,
    username: String,
    password: String,
}

impl ImapConnector {
    pub fn new(
        addr: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.addr, &config.username, &config.password)
    }

    async fn open_client(
        &self,
        server: &ServerAddr,
    ) -> Result<async_imap::Client<BoxedStream>, ConnectionError> {
        let tcp_stream = TcpStream::connect((server.host.as_str(), server.port))
            .await
            .map_err(|source| ConnectionError::Dial {
                addr: self.addr.clone(),
                source,
            })?;

        if server.implicit_tls() {
            tracing::debug!(imap_host = %server.host, "starting implicit TLS");
            let stream = tls_handshake(&server.host, tcp_stream).await?;
            let mut client = async_imap::Client::new(Box::new(stream) as BoxedStream);
            read_greeting(&mut client).await?;
            return Ok(client);
        }

        let mut client = async_imap::Client::new(tcp_stream);
        let starttls = match read_greeting(&mut client).await? {
            Some(advertised) => advertised,
            None => {
                let (queried, advertised) = query_starttls(client).await?;
                client = queried;
                advertised
            }
        };

        if !starttls {
            tracing::debug!(imap_host = %server.host, "server offers no STARTTLS, staying plain");
            return Ok(async_imap::Client::new(
                Box::new(client.into_inner()) as BoxedStream
            ));
        }

        tracing::debug!(imap_host = %server.host, "upgrading with STARTTLS");
        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(ConnectionError::StartTls)?;
        let stream = tls_handshake(&server.host, client.into_inner()).await?;
        Ok(async_imap::Client::new(Box::new(stream) as BoxedStream))
    }
}

impl fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapConnector")
            .field("addr", &self.addr)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl MailConnector for ImapConnector {
    type Session = ImapSession;

    async fn connect(&self) -> Result<ImapSession, ConnectionError> {
        let server = ServerAddr::parse(&self.addr)?;
        tracing::debug!(
            imap_host = %server.host,
            imap_port = server.port,
            implicit_tls = server.implicit_tls(),
            "dialing IMAP server"
        );

        let client = self.open_client(&server).await?;
        let session = client
            .login(&self.username, &self.password)
            .await
            .map_err(|(err, _client)| ConnectionError::Auth(err))?;

        tracing::debug!(username = %self.username, "logged in");
        Ok(ImapSession { inner: session })
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// An authenticated IMAP session.
pub struct ImapSession {
    inner: async_imap::Session<BoxedStream>,
}

impl MailSession for ImapSession {
    async fn status(&mut self, label: &str) -> Result<Vec<MailboxStatus>, QueryError> {
        let mailbox = self
            .inner
            .status(label, "(UNSEEN)")
            .await
            .map_err(|err| match err {
                async_imap::error::Error::No(message) | async_imap::error::Error::Bad(message) => {
                    QueryError::Rejected(format!("STATUS {label} rejected: {message}"))
                }
                source => QueryError::Status {
                    label: label.to_string(),
                    source,
                },
            })?;

        Ok(vec![MailboxStatus {
            unseen: mailbox.unseen,
        }])
    }

    async fn logout(mut self) {
        if let Err(err) = self.inner.logout().await {
            tracing::debug!(error = %err, "IMAP logout failed");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
