//! Contact message envelope and its plain-text rendering.

use crate::types::Address;

/// Body text used when the visitor left the message field empty.
pub const BODY_PLACEHOLDER: &str = "—";

/// What a site visitor submitted; lives for one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    /// Visitor's name, shown in the subject.
    pub display_name: String,
    /// Visitor's address, used as `Reply-To`.
    pub reply_to: String,
    /// Visitor's phone number, free text.
    pub phone: String,
    /// Optional free-text message.
    pub message: Option<String>,
}

impl MailEnvelope {
    /// Creates an envelope without a message body.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        reply_to: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            reply_to: reply_to.into(),
            phone: phone.into(),
            message: None,
        }
    }

    /// Sets the message body.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Subject line naming the visitor.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("Новая заявка с сайта ({})", header_value(&self.display_name))
    }

    /// Body lines: the visitor's details followed by their message.
    fn body_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Имя: {}", header_value(&self.display_name)),
            format!("Email: {}", header_value(&self.reply_to)),
            format!("Телефон: {}", header_value(&self.phone)),
            String::new(),
            "Сообщение:".to_string(),
        ];

        match self.message.as_deref() {
            Some(text) if !text.is_empty() => {
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                lines.extend(text.split('\n').map(str::to_string));
            }
            _ => lines.push(BODY_PLACEHOLDER.to_string()),
        }

        lines
    }

    /// Renders the message sent after `DATA`: headers, a blank line and the
    /// body, CRLF-joined and dot-stuffed. The `.` terminator is not included.
    #[must_use]
    pub fn compose(&self, from: &Address, to: &Address) -> String {
        let mut lines = vec![
            format!("From: {from}"),
            format!("To: {to}"),
            format!("Reply-To: {}", header_value(&self.reply_to)),
            "Content-Type: text/plain; charset=UTF-8".to_string(),
            format!("Subject: {}", self.subject()),
            String::new(),
        ];

        lines.extend(self.body_lines().into_iter().map(|line| {
            if line.starts_with('.') {
                format!(".{line}")
            } else {
                line
            }
        }));

        lines.join("\r\n")
    }
}

/// Flattens a value onto one header line.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
