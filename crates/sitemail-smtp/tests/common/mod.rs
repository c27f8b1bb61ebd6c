//! Scripted SMTP server for integration tests.
//!
//! Listens on 127.0.0.1, answers each received command with the next
//! scripted step, upgrades to TLS (self-signed `localhost` certificate) when
//! it accepts STARTTLS, and records everything it receives.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use sitemail_smtp::{Address, ConnectionConfig, SmtpSender};

/// What the server does with the next command it receives.
#[derive(Debug, Clone)]
pub enum Step {
    /// Send this reply (CRLF appended; may contain embedded CRLFs).
    Reply(&'static str),
    /// Never answer.
    Hang,
    /// Drop the connection without answering.
    Close,
}

/// A command (or DATA payload) as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Whether it arrived over TLS.
    pub secure: bool,
    /// The line without CRLF; for message data, all lines CRLF-joined.
    pub line: String,
}

/// Replies of a server that accepts the whole submission, in order.
pub fn accepting_all() -> Vec<Step> {
    vec![
        Step::Reply("250-mock.localhost greets localhost\r\n250-STARTTLS\r\n250 SIZE 10240000"),
        Step::Reply("220 2.0.0 Ready to start TLS"),
        Step::Reply("250-mock.localhost\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME"),
        Step::Reply("235 2.7.0 Authentication successful"),
        Step::Reply("250 2.1.0 Sender OK"),
        Step::Reply("250 2.1.5 Recipient OK"),
        Step::Reply("354 End data with <CR><LF>.<CR><LF>"),
        Step::Reply("250 2.0.0 Ok: queued as 12345"),
        Step::Reply("221 2.0.0 Bye"),
    ]
}

pub struct MockServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
    closed: Arc<Notify>,
    client_tls: Arc<ClientConfig>,
}

impl MockServer {
    /// Starts a server that serves exactly one connection.
    pub async fn start(greeting: &'static str, steps: Vec<Step>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sitemail_smtp=debug")
            .with_test_writer()
            .try_init();

        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

        let server_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let mut roots = RootCertStore::empty();
        roots.add(cert_der).unwrap();
        let client_tls = Arc::new(
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Notify::new());

        let log = Arc::clone(&received);
        let on_close = Arc::clone(&closed);
        tokio::spawn(async move {
            if let Ok((tcp, _)) = listener.accept().await {
                session(tcp, acceptor, greeting, steps, log, on_close).await;
            }
        });

        Self {
            addr,
            received,
            closed,
            client_tls,
        }
    }

    /// Everything received so far.
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Received lines only.
    pub fn commands(&self) -> Vec<String> {
        self.received().into_iter().map(|r| r.line).collect()
    }

    /// Waits until the client has closed its end of the connection.
    pub async fn wait_closed(&self) -> bool {
        tokio::time::timeout(Duration::from_secs(5), self.closed.notified())
            .await
            .is_ok()
    }

    /// Connection settings pointing at this server, `localhost` as domain.
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(
            "127.0.0.1",
            self.addr.port(),
            "u",
            "p",
            Address::new("site@example.com").unwrap(),
            Address::new("owner@example.com").unwrap(),
        )
        .domain("localhost")
        .command_timeout(Duration::from_secs(5))
    }

    /// A sender that trusts this server's certificate.
    pub fn sender(&self) -> SmtpSender {
        SmtpSender::with_tls_config(Arc::clone(&self.client_tls))
    }
}

enum Outcome {
    Upgrade,
    Closed,
    Dropped,
}

async fn session(
    tcp: TcpStream,
    acceptor: TlsAcceptor,
    greeting: &'static str,
    steps: Vec<Step>,
    log: Arc<Mutex<Vec<Received>>>,
    closed: Arc<Notify>,
) {
    let mut steps = steps.into_iter();
    let mut plain = BufReader::new(tcp);
    if plain
        .get_mut()
        .write_all(format!("{greeting}\r\n").as_bytes())
        .await
        .is_err()
    {
        return;
    }

    match converse(&mut plain, &mut steps, &log, false).await {
        Outcome::Upgrade => {}
        Outcome::Closed => {
            closed.notify_one();
            return;
        }
        Outcome::Dropped => return,
    }

    let Ok(tls) = acceptor.accept(plain.into_inner()).await else {
        closed.notify_one();
        return;
    };

    let mut secure = BufReader::new(tls);
    if matches!(
        converse(&mut secure, &mut steps, &log, true).await,
        Outcome::Closed
    ) {
        closed.notify_one();
    }
}

async fn converse<S>(
    stream: &mut BufReader<S>,
    steps: &mut impl Iterator<Item = Step>,
    log: &Mutex<Vec<Received>>,
    secure: bool,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut in_data = false;
    loop {
        let line = if in_data {
            in_data = false;
            let mut lines = Vec::new();
            loop {
                match read_line(stream).await {
                    Some(line) if line == "." => break,
                    Some(line) => lines.push(line),
                    None => return Outcome::Closed,
                }
            }
            lines.join("\r\n")
        } else {
            match read_line(stream).await {
                Some(line) => line,
                None => return Outcome::Closed,
            }
        };

        log.lock().unwrap().push(Received {
            secure,
            line: line.clone(),
        });

        match steps.next() {
            Some(Step::Reply(text)) => {
                let reply = format!("{text}\r\n");
                if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
                    return Outcome::Closed;
                }
                let _ = stream.get_mut().flush().await;
                if !secure && line == "STARTTLS" && text.starts_with("220") {
                    return Outcome::Upgrade;
                }
                in_data = line == "DATA" && text.starts_with("354");
            }
            Some(Step::Close) => return Outcome::Dropped,
            Some(Step::Hang) | None => {}
        }
    }
}

async fn read_line<S>(stream: &mut BufReader<S>) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = String::new();
    match stream.read_line(&mut buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim_end_matches("\r\n").to_string()),
    }
}
