//! Typed error handling for delivery operations.
//!
//! The split drives retry decisions:
//! - Temporary failures (4xx replies, network trouble) — retry with
//!   backoff up to the attempt cap.
//! - Permanent failures (5xx replies, bad addresses) — fail immediately.
//! - `NotConfigured` — no SMTP settings at all; fails fast and is kept
//!   distinct from Permanent so operators see "not configured" rather
//!   than "rejected".

use quizmail_smtp::ClientError;
use quizmail_store::StoreError;
use thiserror::Error;

/// Top-level delivery error type.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Permanent failure; never retried.
    #[error("permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    /// Temporary failure; retried with backoff.
    #[error("temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    /// No SMTP connection is configured for this installation.
    #[error("no SMTP connection configured")]
    NotConfigured,

    /// Store-level failure while persisting state.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Protocol or data faults that indicate a bug rather than a server
    /// verdict; not retried.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Permanent failures that should not be retried.
#[derive(Debug, Error)]
pub enum PermanentError {
    /// The server rejected AUTH (535 or any 5xx on the AUTH steps).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server rejected the recipient (550-class on RCPT TO).
    #[error("recipient rejected: {0}")]
    RecipientRejected(String),

    /// The server rejected the message (policy, size, content).
    #[error("message rejected: {0}")]
    MessageRejected(String),

    /// An endpoint address failed validation before any connection.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Temporary failures that are retried with backoff.
#[derive(Debug, Error)]
pub enum TemporaryError {
    /// TCP connect failed or the peer went away mid-dialogue.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A protocol step exceeded its timeout budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// 4xx-class reply (421 service unavailable, 450 mailbox busy, ...).
    #[error("temporary SMTP error: {0}")]
    SmtpTemporary(String),

    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),
}

impl DeliveryError {
    /// Whether the failed attempt is eligible for a retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Pure classification of transport errors; the only place reply codes
/// are mapped onto retry behavior.
impl From<ClientError> for DeliveryError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::UnexpectedReply {
                command,
                code,
                message,
            } if (400..500).contains(&code) => Self::Temporary(TemporaryError::SmtpTemporary(
                format!("{command}: {code} {message}"),
            )),

            ClientError::UnexpectedReply {
                command,
                code,
                message,
            } if (500..600).contains(&code) => {
                let detail = format!("{command}: {code} {message}");
                if command.starts_with("AUTH") {
                    Self::Permanent(PermanentError::AuthenticationFailed(detail))
                } else if command == "RCPT TO" {
                    Self::Permanent(PermanentError::RecipientRejected(detail))
                } else {
                    Self::Permanent(PermanentError::MessageRejected(detail))
                }
            }

            ClientError::UnexpectedReply {
                command,
                code,
                message,
            } => Self::Internal(format!(
                "unexpected reply code outside 4xx/5xx: {command}: {code} {message}"
            )),

            ClientError::Io(e) => {
                Self::Temporary(TemporaryError::ConnectionFailed(format!("I/O error: {e}")))
            }

            ClientError::ConnectionClosed => Self::Temporary(TemporaryError::ConnectionFailed(
                "connection closed unexpectedly".to_string(),
            )),

            ClientError::Tls(msg) => Self::Temporary(TemporaryError::TlsHandshakeFailed(msg)),

            ClientError::Parse(msg) => Self::Internal(format!("SMTP reply parse error: {msg}")),

            ClientError::Utf8(e) => Self::Internal(format!("UTF-8 decoding error: {e}")),
        }
    }
}
