//! # sitemail-smtp
//!
//! A small SMTP submission client: one connection per message, mandatory
//! STARTTLS, AUTH PLAIN, one recipient.
//!
//! ## Features
//!
//! - **Type-state connection management**: the submission order is enforced
//!   at compile time; envelope commands cannot be sent before TLS
//! - **Pull-based reply parsing**: tolerant of arbitrary TCP fragmentation
//!   and multi-line replies
//! - **Bounded waits**: every connect, handshake and command/reply round trip
//!   has a timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use sitemail_smtp::{Address, ConnectionConfig, MailEnvelope, SmtpSender};
//!
//! #[tokio::main]
//! async fn main() -> sitemail_smtp::Result<()> {
//!     let config = ConnectionConfig::new(
//!         "smtp.example.com",
//!         587,
//!         "site@example.com",
//!         "password",
//!         Address::new("site@example.com")?,
//!         Address::new("owner@example.com")?,
//!     )
//!     .domain("example.com");
//!
//!     let envelope = MailEnvelope::new("Иван", "ivan@example.com", "+7 900 000-00-00")
//!         .with_message("Хочу записаться на консультацию");
//!
//!     SmtpSender::new().send(&envelope, &config).await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Greeted ─ ehlo ─→ Negotiated ─ starttls ─→ Upgraded ─ ehlo ─→ Secured
//!                                                                  │
//!                                                             auth_plain
//!                                                                  ↓
//!  Data ←─ data ─ RecipientAdded ←─ rcpt_to ─ MailTransaction ←─ Authenticated
//!   │                                                              ↑
//!   └────────────────────────── send_message ──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transport and type-state client
//! - [`parser`]: Reply buffer and line splitter
//! - [`types`]: Addresses and reply codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
mod message;
pub mod parser;
mod sender;
pub mod types;

pub use connection::{Client, Transport};
pub use error::{Error, Result};
pub use message::{BODY_PLACEHOLDER, MailEnvelope};
pub use sender::{ConnectionConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, SmtpSender};
pub use types::{Address, Reply, ReplyCode};
