//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required environment variables are missing or empty.
    #[error("Missing env: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    /// Configuration value present but unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Request body exceeded the accepted size.
    #[error("Payload too large (limit {limit} bytes)")]
    PayloadTooLarge {
        /// The limit that was exceeded.
        limit: usize,
    },

    /// A required form field is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The message could not be delivered. Details are logged, not exposed.
    #[error("Failed to send message")]
    DeliveryFailed,

    /// Wrong password or unknown session token.
    #[error("Unauthorized")]
    Unauthorized,

    /// No admin password configured on the server.
    #[error("Admin login is disabled: ADMIN_PASSWORD is not set")]
    AdminDisabled,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_lists_names() {
        let err = Error::MissingEnv(vec!["SMTP_HOST", "CONTACT_TO"]);
        assert_eq!(err.to_string(), "Missing env: SMTP_HOST, CONTACT_TO");
    }

    #[test]
    fn delivery_failure_is_opaque() {
        assert_eq!(Error::DeliveryFailed.to_string(), "Failed to send message");
    }
}
