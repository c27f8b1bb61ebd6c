//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{
    Authenticated, Client, Data, Greeted, MailTransaction, Negotiated, RecipientAdded, Secured,
    Upgraded, plain_token,
};
pub use stream::{Transport, connect, default_tls_config};
