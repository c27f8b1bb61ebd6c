//! Envelope address type.

use crate::error::{Error, Result};

/// Email address used in `MAIL FROM` / `RCPT TO` and the matching headers.
///
/// Accepted: exactly one `@`, non-empty local and domain parts, and no
/// whitespace, control characters or angle brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        };

        match (local.is_empty(), domain.is_empty(), domain.contains('@')) {
            (false, false, false) => Ok(()),
            (_, _, true) => Err(Error::InvalidAddress(format!("More than one @ in {addr:?}"))),
            _ => Err(Error::InvalidAddress(format!("Empty local or domain part in {addr:?}"))),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_rejects_malformed_parts() {
        for bad in ["@example.com", "user@", "@", "a@b@example.com"] {
            assert!(
                matches!(Address::new(bad), Err(Error::InvalidAddress(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn test_rejects_command_injection() {
        assert!(Address::new("a@example.com>\r\nRCPT TO:<b@example.com").is_err());
        assert!(Address::new("a b@example.com").is_err());
        assert!(Address::new("<a@example.com>").is_err());
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "info@example.org".parse().unwrap();
        assert_eq!(addr.as_str(), "info@example.org");
    }
}
