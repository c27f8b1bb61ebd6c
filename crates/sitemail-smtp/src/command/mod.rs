//! SMTP command builder.

use crate::types::{Address, ReplyCode};

/// SMTP command issued during a submission.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client domain
        domain: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH PLAIN with initial response
    AuthPlain {
        /// Base64 of `\0username\0password`
        token: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// The message content followed by the `.` terminator line
    Payload {
        /// Fully composed, dot-stuffed message
        message: String,
    },
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { domain } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(domain.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::AuthPlain { token } => {
                buf.extend_from_slice(b"AUTH PLAIN ");
                buf.extend_from_slice(token.as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Payload { message } => {
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(b"\r\n.");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Short name for logs and timeout errors. Never contains credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::AuthPlain { .. } => "AUTH PLAIN",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Payload { .. } => "message data",
            Self::Quit => "QUIT",
        }
    }

    /// The reply code that lets the sequence continue.
    #[must_use]
    pub const fn expected_reply(&self) -> ReplyCode {
        match self {
            Self::Ehlo { .. } | Self::MailFrom { .. } | Self::RcptTo { .. } | Self::Payload { .. } => {
                ReplyCode::OK
            }
            Self::StartTls => ReplyCode::SERVICE_READY,
            Self::AuthPlain { .. } => ReplyCode::AUTH_SUCCESSFUL,
            Self::Data => ReplyCode::START_DATA,
            Self::Quit => ReplyCode::CLOSING,
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ehlo { domain } => write!(f, "EHLO {domain}"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::AuthPlain { .. } => f.write_str("AUTH PLAIN <redacted>"),
            Self::Payload { message } => write!(f, "<{} bytes of message data>", message.len()),
            other => f.write_str(other.name()),
        }
    }
}
