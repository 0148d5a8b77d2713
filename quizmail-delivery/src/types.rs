//! Type definitions shared across the delivery crate.

use chrono::{DateTime, Utc};
use quizmail_common::envelope::Envelope;
use quizmail_common::message::MessageKind;
use quizmail_store::QueueItem;
use serde::{Deserialize, Serialize};

/// SMTP operation timeout configuration.
///
/// Every blocking protocol step carries its own budget so a hung server
/// surfaces as a retryable failure instead of wedging a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpTimeouts {
    /// TCP connect plus TLS handshake.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub connect_secs: u64,

    /// Server greeting.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub greeting_secs: u64,

    /// EHLO.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub ehlo_secs: u64,

    /// The three AUTH LOGIN exchanges combined.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub auth_secs: u64,

    /// MAIL FROM.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub mail_from_secs: u64,

    /// RCPT TO.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_step_timeout")]
    pub rcpt_to_secs: u64,

    /// DATA go-ahead and message transmission; longer to accommodate
    /// large bodies.
    ///
    /// Default: 120 seconds
    #[serde(default = "default_data_timeout")]
    pub data_secs: u64,

    /// QUIT.
    ///
    /// Default: 10 seconds
    #[serde(default = "default_quit_timeout")]
    pub quit_secs: u64,

    /// Budget for the whole transaction regardless of per-step slack.
    ///
    /// Default: 120 seconds
    #[serde(default = "default_total_timeout")]
    pub total_secs: u64,
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_step_timeout(),
            greeting_secs: default_step_timeout(),
            ehlo_secs: default_step_timeout(),
            auth_secs: default_step_timeout(),
            mail_from_secs: default_step_timeout(),
            rcpt_to_secs: default_step_timeout(),
            data_secs: default_data_timeout(),
            quit_secs: default_quit_timeout(),
            total_secs: default_total_timeout(),
        }
    }
}

const fn default_step_timeout() -> u64 {
    30
}

const fn default_data_timeout() -> u64 {
    120
}

const fn default_quit_timeout() -> u64 {
    10
}

const fn default_total_timeout() -> u64 {
    120
}

/// A producer's candidate message, before dedup and queueing.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub envelope: Envelope,
    pub subject: String,
    pub html_body: String,
    pub kind: MessageKind,
    pub locale: String,
    /// Hold the message until this time even if a batch runs earlier.
    pub not_before: Option<DateTime<Utc>>,
}

impl NewMessage {
    #[must_use]
    pub fn new(
        envelope: Envelope,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        kind: MessageKind,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            envelope,
            subject: subject.into(),
            html_body: html_body.into(),
            kind,
            locale: locale.into(),
            not_before: None,
        }
    }

    #[must_use]
    pub const fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }
}

/// Outcome of [`crate::QueueManager::enqueue`]. Expected business
/// outcomes are values, not errors.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// The message was accepted and persisted in `Pending`.
    Accepted(QueueItem),
    /// The dedup guard (or the store's atomic insert) declined it.
    Duplicate { reason: String },
    /// An envelope address failed validation.
    Invalid { reason: String },
}

impl EnqueueOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// What one [`crate::QueueManager::process_batch`] invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items selected from the queue this batch.
    pub selected: usize,
    /// Items delivered and mirrored into a sent log.
    pub sent: usize,
    /// Items rescheduled with backoff.
    pub retried: usize,
    /// Items terminally failed and mirrored into a failed log.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults() {
        let timeouts = SmtpTimeouts::default();
        assert_eq!(timeouts.connect_secs, 30);
        assert_eq!(timeouts.data_secs, 120);
        assert_eq!(timeouts.quit_secs, 10);
        assert_eq!(timeouts.total_secs, 120);
    }
}
