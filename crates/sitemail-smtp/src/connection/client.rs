//! Type-state SMTP client.
//!
//! Each state only exposes the commands that are legal next, so the
//! submission order is fixed at compile time and `MAIL FROM` / `RCPT TO` /
//! `DATA` can only ever be issued after the STARTTLS upgrade.

use std::io;
use std::marker::PhantomData;
use std::time::Duration;

use base64::Engine;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_rustls::TlsConnector;

use super::Transport;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::ReplyBuffer;
use crate::types::{Address, Reply, ReplyCode};

/// Greeting received, nothing sent yet.
#[derive(Debug)]
pub struct Greeted;

/// EHLO accepted on the plaintext stream.
#[derive(Debug)]
pub struct Negotiated;

/// TLS established, server state reset; EHLO must be repeated.
#[derive(Debug)]
pub struct Upgraded;

/// EHLO accepted over TLS.
#[derive(Debug)]
pub struct Secured;

/// AUTH accepted.
#[derive(Debug)]
pub struct Authenticated;

/// MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// DATA accepted, the server is waiting for the message.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: Transport<S>,
    buffer: ReplyBuffer,
    timeout: Duration,
    _state: PhantomData<State>,
}

impl<S> Client<S, Greeted>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Takes ownership of a freshly opened plaintext stream and waits for
    /// the `220` greeting.
    ///
    /// `timeout` bounds the greeting and every later command/reply round
    /// trip, as well as the TLS handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is not `220`, the peer hangs up, or
    /// nothing arrives within `timeout`.
    pub async fn greet(stream: S, timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: Transport::Plain(stream),
            buffer: ReplyBuffer::new(),
            timeout,
            _state: PhantomData,
        };

        let reply = tokio::time::timeout(timeout, client.buffer.read_reply(&mut client.stream))
            .await
            .map_err(|_| Error::Timeout {
                stage: "greeting",
                after: timeout,
            })??;
        expect(reply, ReplyCode::SERVICE_READY)?;

        Ok(client)
    }

    /// Sends EHLO on the plaintext stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn ehlo(mut self, domain: &str) -> Result<Client<S, Negotiated>> {
        self.command(Command::Ehlo {
            domain: domain.to_string(),
        })
        .await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Negotiated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Issues STARTTLS and performs the TLS handshake on the same socket,
    /// using `server_name` for SNI and certificate verification.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is refused, the server pipelines
    /// plaintext after its `220`, or the handshake fails.
    pub async fn starttls(
        mut self,
        connector: &TlsConnector,
        server_name: &str,
    ) -> Result<Client<S, Upgraded>> {
        self.command(Command::StartTls).await?;

        // Anything already buffered arrived in plaintext and must not be
        // mistaken for a reply on the secured channel.
        if !self.buffer.is_empty() {
            return Err(Error::Tls(io::Error::new(
                io::ErrorKind::InvalidData,
                "server sent plaintext data after STARTTLS reply",
            )));
        }

        let stream = self
            .stream
            .upgrade_to_tls(connector, server_name, self.timeout)
            .await?;
        tracing::debug!(server_name, "TLS established");

        Ok(Client {
            stream,
            buffer: self.buffer,
            timeout: self.timeout,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Upgraded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Repeats EHLO over TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn ehlo(mut self, domain: &str) -> Result<Client<S, Secured>> {
        self.command(Command::Ehlo {
            domain: domain.to_string(),
        })
        .await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Secured>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Authenticates using the PLAIN mechanism with an initial response.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `235`.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.command(Command::AuthPlain {
            token: plain_token(username, password),
        })
        .await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn mail_from(mut self, from: &Address) -> Result<Client<S, MailTransaction>> {
        self.command(Command::MailFrom { from: from.clone() })
            .await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<S, RecipientAdded>> {
        self.command(Command::RcptTo { to: to.clone() }).await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        self.command(Command::RcptTo { to: to.clone() }).await?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `354`.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        self.command(Command::Data).await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends the composed message followed by the `.` terminator line in a
    /// single write.
    ///
    /// `message` must already be CRLF-delimited and dot-stuffed, as produced
    /// by [`MailEnvelope::compose`](crate::MailEnvelope::compose).
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not accept the message with `250`.
    pub async fn send_message(mut self, message: String) -> Result<Client<S, Authenticated>> {
        self.command(Command::Payload { message }).await?;
        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns true once the STARTTLS upgrade has happened.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    /// Sends QUIT, waits for `221`, then shuts the transport down.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `221`. A failed shutdown after
    /// `221` is only logged: the server has already closed the session.
    pub async fn quit(mut self) -> Result<()> {
        self.command(Command::Quit).await?;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(error = %e, "shutdown after QUIT failed");
        }
        Ok(())
    }

    async fn command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::debug!(command = ?cmd, "C:");
        let expected = cmd.expected_reply();
        let data = cmd.serialize();

        let reply = tokio::time::timeout(
            self.timeout,
            round_trip(&mut self.stream, &mut self.buffer, &data),
        )
        .await
        .map_err(|_| Error::Timeout {
            stage: cmd.name(),
            after: self.timeout,
        })??;

        expect(reply, expected)
    }

    fn transition<T>(self) -> Client<S, T> {
        Client {
            stream: self.stream,
            buffer: self.buffer,
            timeout: self.timeout,
            _state: PhantomData,
        }
    }
}

async fn round_trip<S>(
    stream: &mut Transport<S>,
    buffer: &mut ReplyBuffer,
    data: &[u8],
) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    buffer.read_reply(stream).await
}

fn expect(reply: Reply, expected: ReplyCode) -> Result<Reply> {
    tracing::debug!(reply = %reply.text, "S:");
    if reply.has_code(expected) {
        Ok(reply)
    } else {
        Err(Error::protocol(expected, reply.text))
    }
}

/// Builds the AUTH PLAIN initial response: base64 of `\0username\0password`.
#[must_use]
pub fn plain_token(username: &str, password: &str) -> String {
    let credentials = format!("\0{username}\0{password}");
    base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
}
