//! # sitemail-core
//!
//! Site-facing logic around the `sitemail-smtp` delivery client.
//!
//! This crate provides:
//! - Environment configuration (`.env` loading, required SMTP settings)
//! - **Contact intake** - size-limited JSON bodies, field validation, delivery
//! - **Admin sessions** - password login and bearer-token checks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod contact;
mod error;
pub mod session;

pub use config::{AdminSettings, ENV_FILE, REQUIRED_SMTP_ENV, SmtpSettings, load_env_file};
pub use contact::{ContactRequest, ContactService, MAX_BODY_SIZE, read_body};
pub use error::{Error, Result};
pub use session::{
    AdminAuth, DEFAULT_MAX_SESSIONS, MemorySessionStore, SessionStore, bearer_token,
};
