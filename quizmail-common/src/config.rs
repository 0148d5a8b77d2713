//! SMTP submission configuration.
//!
//! Supplied by the surrounding product (stored per-installation in its
//! settings screen); the delivery subsystem never hardcodes connection
//! details. Absence of a configuration is a first-class state — every
//! send then fails fast with a "not configured" error rather than a
//! rejection.

use serde::{Deserialize, Serialize};

use crate::envelope::Mailbox;

/// Connection and sender-identity settings for the submission transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Submission server hostname.
    pub host: String,

    /// Submission port.
    ///
    /// Default: 465 (implicit TLS)
    #[serde(default = "default_port")]
    pub port: u16,

    /// AUTH LOGIN username.
    pub username: String,

    /// AUTH LOGIN password.
    pub password: String,

    /// Whether the connection must be TLS-wrapped from the first byte.
    ///
    /// Default: true
    #[serde(default = "default_require_tls")]
    pub require_tls: bool,

    /// Address placed in `MAIL FROM` and the `From` header.
    pub sender_address: String,

    /// Display name for the `From` header.
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Optional `Reply-To` address applied to every message.
    #[serde(default)]
    pub reply_to: Option<String>,

    /// Identity announced in `EHLO`.
    ///
    /// Default: "quizmail.invalid"
    #[serde(default = "default_ehlo_name")]
    pub ehlo_name: String,
}

impl SmtpConfig {
    /// `host:port` pair for the TCP connect.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured sender as a [`Mailbox`].
    #[must_use]
    pub fn sender_mailbox(&self) -> Mailbox {
        Mailbox {
            address: self.sender_address.clone(),
            name: self.sender_name.clone(),
        }
    }
}

const fn default_port() -> u16 {
    465
}

const fn default_require_tls() -> bool {
    true
}

fn default_ehlo_name() -> String {
    "quizmail.invalid".to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let config: SmtpConfig = serde_json::from_str(
            r#"{
                "host": "smtp.example.com",
                "username": "mailer",
                "password": "hunter2",
                "sender_address": "quiz@example.com"
            }"#,
        )
        .expect("deserialize");

        assert_eq!(config.port, 465);
        assert!(config.require_tls);
        assert_eq!(config.ehlo_name, "quizmail.invalid");
        assert_eq!(config.server_addr(), "smtp.example.com:465");
        assert_eq!(config.sender_mailbox().address, "quiz@example.com");
    }
}
