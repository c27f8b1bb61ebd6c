//! Transport handling: plaintext TCP that is replaced by TLS after STARTTLS.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// The socket a submission runs over.
///
/// Starts as `Plain` and is swapped wholesale for `Secure` once the TLS
/// handshake on the same socket succeeds. Both variants expose the same
/// `AsyncRead + AsyncWrite` surface, so the command code never branches.
#[derive(Debug)]
pub enum Transport<S> {
    /// Plaintext stream, only used up to STARTTLS.
    Plain(S),
    /// TLS stream (boxed to reduce enum size).
    Secure(Box<TlsStream<S>>),
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns true once the transport has been upgraded.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        matches!(self, Self::Secure(_))
    }

    /// Performs the TLS handshake on the underlying socket and returns the
    /// secured transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidServerName`] if `server_name` is not a valid
    /// DNS name or IP address, [`Error::Tls`] if the handshake fails, and
    /// [`Error::Timeout`] if it does not finish within `limit`.
    pub async fn upgrade_to_tls(
        self,
        connector: &TlsConnector,
        server_name: &str,
        limit: Duration,
    ) -> Result<Self> {
        let plain = match self {
            Self::Plain(stream) => stream,
            Self::Secure(_) => {
                return Err(Error::Tls(io::Error::other("stream is already TLS")));
            }
        };

        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| Error::InvalidServerName(server_name.to_string()))?;

        let tls = tokio::time::timeout(limit, connector.connect(name, plain))
            .await
            .map_err(|_| Error::Timeout {
                stage: "TLS handshake",
                after: limit,
            })?
            .map_err(Error::Tls)?;

        Ok(Self::Secure(Box::new(tls)))
    }
}

impl<S> AsyncRead for Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Secure(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl<S> AsyncWrite for Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Secure(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Secure(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Secure(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Opens a plaintext TCP connection to `host:port`.
///
/// # Errors
///
/// Returns [`Error::Connect`] if the connection fails and [`Error::Timeout`]
/// if it is not established within `limit`.
pub async fn connect(host: &str, port: u16, limit: Duration) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(limit, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(Error::Connect { addr, source }),
        Err(_) => Err(Error::Timeout {
            stage: "connect",
            after: limit,
        }),
    }
}

/// Creates a TLS client configuration trusting the bundled web PKI roots.
#[must_use]
pub fn default_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}
