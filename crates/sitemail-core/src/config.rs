//! Settings read from the process environment.
//!
//! A local `.env` file may pre-populate the environment for development;
//! variables that are already set always win over the file.

use std::path::Path;
use std::time::Duration;

use sitemail_smtp::{Address, ConnectionConfig};

use crate::error::{Error, Result};

/// Default `.env` location, relative to the working directory.
pub const ENV_FILE: &str = ".env";

/// Variables without which contact messages cannot be sent, in report order.
pub const REQUIRED_SMTP_ENV: [&str; 5] = [
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "CONTACT_TO",
];

const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Loads `path` into the environment without overriding existing variables.
///
/// Returns `Ok(false)` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool> {
    match dotenv::from_path(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(dotenv::Error::Io(e)) => Err(Error::Io(e)),
        Err(e) => Err(Error::Config(format!(
            "{}: {e}",
            path.as_ref().display()
        ))),
    }
}

/// Reads a variable from the process environment, trimmed; empty counts as
/// unset.
#[must_use]
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// SMTP submission settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// `SMTP_HOST`
    pub host: String,
    /// `SMTP_PORT`
    pub port: u16,
    /// `SMTP_DOMAIN`, default `localhost`
    pub domain: String,
    /// `SMTP_USER`
    pub username: String,
    /// `SMTP_PASSWORD`
    pub password: String,
    /// `CONTACT_FROM`, default `SMTP_USER`
    pub mail_from: String,
    /// `CONTACT_TO`
    pub rcpt_to: String,
    /// `SMTP_TIMEOUT_SECS`, default 30
    pub command_timeout: Duration,
    /// `SMTP_CONNECT_TIMEOUT_SECS`, default 30
    pub connect_timeout: Duration,
}

impl SmtpSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Reads settings through `lookup`. Values are trimmed and blank values
    /// count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnv`] naming every missing required variable,
    /// or [`Error::Config`] for a malformed port or timeout.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let missing: Vec<&'static str> = REQUIRED_SMTP_ENV
            .into_iter()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingEnv(missing));
        }

        let required = |key: &'static str| get(key).ok_or_else(|| Error::MissingEnv(vec![key]));

        let port = required("SMTP_PORT")?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("SMTP_PORT is not a valid port: {port}")))?;

        let username = required("SMTP_USER")?;
        Ok(Self {
            host: required("SMTP_HOST")?,
            port,
            domain: get("SMTP_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            mail_from: get("CONTACT_FROM").unwrap_or_else(|| username.clone()),
            username,
            password: required("SMTP_PASSWORD")?,
            rcpt_to: required("CONTACT_TO")?,
            command_timeout: seconds(&get, "SMTP_TIMEOUT_SECS")?,
            connect_timeout: seconds(&get, "SMTP_CONNECT_TIMEOUT_SECS")?,
        })
    }

    /// Builds the per-send connection configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `CONTACT_FROM`/`SMTP_USER` or
    /// `CONTACT_TO` is not a usable address.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mail_from = Address::new(&self.mail_from)
            .map_err(|e| Error::Config(format!("CONTACT_FROM: {e}")))?;
        let rcpt_to = Address::new(&self.rcpt_to)
            .map_err(|e| Error::Config(format!("CONTACT_TO: {e}")))?;

        Ok(ConnectionConfig::new(
            &self.host,
            self.port,
            &self.username,
            &self.password,
            mail_from,
            rcpt_to,
        )
        .domain(&self.domain)
        .command_timeout(self.command_timeout)
        .connect_timeout(self.connect_timeout))
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mail_from", &self.mail_from)
            .field("rcpt_to", &self.rcpt_to)
            .field("command_timeout", &self.command_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "{key} must be a positive number of seconds: {raw}"
        ))),
    }
}

/// Admin login settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AdminSettings {
    /// `ADMIN_PASSWORD`; admin login is disabled when unset.
    pub password: Option<String>,
    /// `ADMIN_TOKEN`; a fixed, pre-issued session token.
    pub token: Option<String>,
}

impl AdminSettings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Reads settings through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            password: lookup("ADMIN_PASSWORD").and_then(non_empty),
            token: lookup("ADMIN_TOKEN").and_then(non_empty),
        }
    }
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
