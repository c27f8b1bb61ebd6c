//! SMTP reply types.

/// One parsed SMTP reply line.
///
/// A multi-line reply is a run of lines whose fourth character is `-`,
/// closed by a line where it is anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The first three bytes of the line, if the line has at least three.
    pub code: Option<ReplyCode>,
    /// True if more lines of the same reply follow.
    pub continuation: bool,
    /// The raw line without its CRLF terminator.
    pub text: String,
}

impl Reply {
    /// Parses a single line (CRLF already stripped).
    #[must_use]
    pub fn parse(line: impl Into<String>) -> Self {
        let text = line.into();
        let bytes = text.as_bytes();
        let code = bytes
            .get(..3)
            .and_then(|c| <[u8; 3]>::try_from(c).ok())
            .map(ReplyCode);
        let continuation = bytes.get(3) == Some(&b'-');
        Self {
            code,
            continuation,
            text,
        }
    }

    /// Returns true if this line closes its reply.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        !self.continuation
    }

    /// Returns true if the line carries exactly the given code.
    #[must_use]
    pub fn has_code(&self, expected: ReplyCode) -> bool {
        self.code == Some(expected)
    }
}

/// Three-character SMTP reply code, compared byte for byte.
///
/// Codes are never parsed as numbers: `250` and `25O` are simply different.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyCode([u8; 3]);

impl ReplyCode {
    /// Creates a reply code from its three characters.
    #[must_use]
    pub const fn new(code: [u8; 3]) -> Self {
        Self(code)
    }

    /// Returns the raw code bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

// Codes the submission sequence waits for
impl ReplyCode {
    /// 220 Service ready (greeting, STARTTLS go-ahead)
    pub const SERVICE_READY: Self = Self(*b"220");
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(*b"221");
    /// 235 Authentication successful
    pub const AUTH_SUCCESSFUL: Self = Self(*b"235");
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(*b"250");
    /// 354 Start mail input
    pub const START_DATA: Self = Self(*b"354");
}
