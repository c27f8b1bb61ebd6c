//! One-shot submission: one connection, one message, then QUIT.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::ClientConfig;

use crate::connection::{Client, connect, default_tls_config};
use crate::error::Result;
use crate::message::MailEnvelope;
use crate::types::Address;

/// Default bound for one command/reply round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and as whom to submit.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Name sent in EHLO and used as TLS server name.
    pub domain: String,
    /// AUTH PLAIN username.
    pub username: String,
    /// AUTH PLAIN password.
    pub password: String,
    /// Envelope sender, also the `From` header.
    pub mail_from: Address,
    /// Envelope recipient, also the `To` header.
    pub rcpt_to: Address,
    /// Bound for the TCP connect.
    pub connect_timeout: Duration,
    /// Bound for each command/reply round trip and the TLS handshake.
    pub command_timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a configuration with default timeouts and `localhost` as the
    /// EHLO domain.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        mail_from: Address,
        rcpt_to: Address,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            domain: "localhost".to_string(),
            username: username.into(),
            password: password.into(),
            mail_from,
            rcpt_to,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the EHLO / SNI domain.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mail_from", &self.mail_from)
            .field("rcpt_to", &self.rcpt_to)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Delivers one message per call over a fresh connection.
///
/// Holds no connection state, so one sender can serve any number of
/// concurrent sends. Dropping a `send` future closes its socket.
#[derive(Clone)]
pub struct SmtpSender {
    connector: TlsConnector,
}

impl SmtpSender {
    /// Creates a sender that verifies servers against the web PKI roots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tls_config(default_tls_config())
    }

    /// Creates a sender with a custom TLS client configuration (private CA,
    /// pinned roots).
    #[must_use]
    pub fn with_tls_config(config: Arc<ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
        }
    }

    /// Connects to `config.host:config.port` and delivers `envelope`.
    ///
    /// # Errors
    ///
    /// Returns the first failure: connect, TLS, timeout, I/O or an
    /// unexpected reply. Nothing is retried.
    pub async fn send(&self, envelope: &MailEnvelope, config: &ConnectionConfig) -> Result<()> {
        let stream = connect(&config.host, config.port, config.connect_timeout).await?;
        tracing::debug!(host = %config.host, port = config.port, "connected");
        self.deliver(stream, envelope, config).await
    }

    /// Runs the full submission over an already opened plaintext stream.
    ///
    /// The stream is consumed; it is shut down after QUIT or dropped at the
    /// first failure.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), minus connect failures.
    pub async fn deliver<S>(
        &self,
        stream: S,
        envelope: &MailEnvelope,
        config: &ConnectionConfig,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let client = Client::greet(stream, config.command_timeout).await?;
        let client = client.ehlo(&config.domain).await?;
        let client = client.starttls(&self.connector, &config.domain).await?;
        let client = client.ehlo(&config.domain).await?;
        let client = client
            .auth_plain(&config.username, &config.password)
            .await?;
        let client = client.mail_from(&config.mail_from).await?;
        let client = client.rcpt_to(&config.rcpt_to).await?;
        let client = client.data().await?;
        let message = envelope.compose(&config.mail_from, &config.rcpt_to);
        let client = client.send_message(message).await?;
        client.quit().await?;

        tracing::info!(rcpt_to = %config.rcpt_to, "message delivered");
        Ok(())
    }
}

impl Default for SmtpSender {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SmtpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSender").finish_non_exhaustive()
    }
}
