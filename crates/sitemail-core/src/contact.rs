//! Contact form intake: size-limited body, validation, delivery.

use serde::Deserialize;
use sitemail_smtp::{ConnectionConfig, MailEnvelope, SmtpSender};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::SmtpSettings;
use crate::error::{Error, Result};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_SIZE: usize = 5_000_000;

/// Reads a request body of at most [`MAX_BODY_SIZE`] bytes.
///
/// # Errors
///
/// See [`read_body_limited`].
pub async fn read_body<R>(reader: R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    read_body_limited(reader, MAX_BODY_SIZE).await
}

/// Reads a request body, stopping as soon as more than `limit` bytes have
/// arrived.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] past the limit, or an I/O error.
pub async fn read_body_limited<R>(reader: R, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut body).await?;

    if body.len() > limit {
        return Err(Error::PayloadTooLarge { limit });
    }
    Ok(body)
}

/// A contact form submission as posted by the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    /// Visitor's name.
    pub name: Option<String>,
    /// Visitor's email address.
    pub email: Option<String>,
    /// Visitor's phone number.
    pub phone: Option<String>,
    /// Free-text message.
    pub message: Option<String>,
}

impl ContactRequest {
    /// Parses a JSON body; an empty body is treated as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body is not a JSON object of strings.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(body)?)
    }

    /// Checks required fields and builds the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] for the first blank required field.
    pub fn into_envelope(self) -> Result<MailEnvelope> {
        let name = required(self.name, "name")?;
        let email = required(self.email, "email")?;
        let phone = required(self.phone, "phone")?;

        let envelope = MailEnvelope::new(name, email, phone);
        Ok(match self.message {
            Some(message) => envelope.with_message(message),
            None => envelope,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingField(field))
}

/// Delivers contact submissions to the site owner.
#[derive(Debug, Clone)]
pub struct ContactService {
    sender: SmtpSender,
    config: ConnectionConfig,
}

impl ContactService {
    /// Creates a service from environment-derived settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured addresses are unusable.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        Ok(Self::with_sender(
            SmtpSender::new(),
            settings.connection_config()?,
        ))
    }

    /// Creates a service with an explicit sender and configuration.
    #[must_use]
    pub const fn with_sender(sender: SmtpSender, config: ConnectionConfig) -> Self {
        Self { sender, config }
    }

    /// Validates and delivers one submission.
    ///
    /// Delivery failures are logged with full detail and reported to the
    /// caller only as [`Error::DeliveryFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] for incomplete submissions and
    /// [`Error::DeliveryFailed`] if the message could not be sent.
    pub async fn submit(&self, request: ContactRequest) -> Result<()> {
        let envelope = request.into_envelope()?;

        match self.sender.send(&envelope, &self.config).await {
            Ok(()) => {
                tracing::info!(name = %envelope.display_name, "contact request delivered");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, host = %self.config.host, "contact request delivery failed");
                Err(Error::DeliveryFailed)
            }
        }
    }

    /// Reads, parses and delivers a raw JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`], [`Error::Json`], or any error from
    /// [`submit`](Self::submit).
    pub async fn submit_body<R>(&self, body: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let body = read_body(body).await?;
        self.submit(ContactRequest::from_json(&body)?).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sitemail_smtp::{Address, BODY_PLACEHOLDER};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn body_within_limit() {
        let body = read_body_limited(&b"{\"name\":\"A\"}"[..], 64).await.unwrap();
        assert_eq!(body, b"{\"name\":\"A\"}");
    }

    #[tokio::test]
    async fn body_over_limit_rejected() {
        let data = vec![b'x'; 65];
        let err = read_body_limited(&data[..], 64).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 64 }));
    }

    #[tokio::test]
    async fn body_exactly_at_limit_accepted() {
        let data = vec![b'x'; 64];
        assert_eq!(read_body_limited(&data[..], 64).await.unwrap().len(), 64);
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(
            ContactRequest::from_json(b"  ").unwrap(),
            ContactRequest::default()
        );
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            ContactRequest::from_json(b"{name:"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn required_fields_checked_in_order() {
        let request =
            ContactRequest::from_json(r#"{"name":"Иван","phone":"+7"}"#.as_bytes()).unwrap();
        assert!(matches!(
            request.into_envelope(),
            Err(Error::MissingField("email"))
        ));

        let request = ContactRequest::from_json(br#"{"name":"  ","email":"a@b.c"}"#).unwrap();
        assert!(matches!(
            request.into_envelope(),
            Err(Error::MissingField("name"))
        ));
    }

    #[test]
    fn envelope_from_request() {
        let request = ContactRequest::from_json(
            r#"{"name":"Иван","email":"ivan@example.com","phone":"+7...","message":""}"#
                .as_bytes(),
        )
        .unwrap();
        let envelope = request.into_envelope().unwrap();
        assert_eq!(envelope.subject(), "Новая заявка с сайта (Иван)");
        assert_eq!(envelope.reply_to, "ivan@example.com");

        let from = Address::new("site@example.com").unwrap();
        let to = Address::new("owner@example.com").unwrap();
        assert!(envelope.compose(&from, &to).ends_with(BODY_PLACEHOLDER));
    }

    fn service_for(port: u16) -> ContactService {
        let config = ConnectionConfig::new(
            "127.0.0.1",
            port,
            "u",
            "p",
            Address::new("site@example.com").unwrap(),
            Address::new("owner@example.com").unwrap(),
        )
        .command_timeout(Duration::from_secs(5));
        ContactService::with_sender(SmtpSender::new(), config)
    }

    #[tokio::test]
    async fn server_rejection_is_reported_opaquely() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"554 5.3.2 Service unavailable\r\n")
                .await
                .unwrap();
        });

        let err = service_for(port)
            .submit_body(&br#"{"name":"A","email":"a@example.com","phone":"1"}"#[..])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeliveryFailed));
        assert_eq!(err.to_string(), "Failed to send message");
    }

    #[tokio::test]
    async fn validation_happens_before_connecting() {
        let err = service_for(9)
            .submit_body(&br#"{"name":"A","email":"a@example.com"}"#[..])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("phone")));
    }
}
