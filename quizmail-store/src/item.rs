//! A message waiting to be delivered.

use chrono::{DateTime, Utc};
use quizmail_common::envelope::Envelope;
use quizmail_common::message::{Category, MessageKind};
use serde::{Deserialize, Serialize};

use crate::types::{LogId, MessageId};

/// Lifecycle state of a queued message.
///
/// Transitions are one-directional — `Pending → Processing → Sent` or
/// `→ Failed` — except `Failed`-bound attempts returning to `Pending`
/// while the attempt cap has not been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Pending,
    Processing,
    Sent,
    Failed,
}

/// One message in the outbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: MessageId,
    pub envelope: Envelope,
    /// Unicode subject line, encoded for the wire only at send time.
    pub subject: String,
    /// Pre-rendered HTML body; template substitution happened upstream.
    pub html_body: String,
    pub kind: MessageKind,
    /// BCP-47-ish language code, kept for display and audit only.
    pub locale: String,
    pub state: QueueState,
    /// Number of delivery attempts made so far; monotonically increasing.
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Earliest time the processing loop may pick this item up.
    pub not_before: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Set when a worker takes the item; the stale-item sweeper reclaims
    /// items stuck here past the processing timeout.
    pub processing_since: Option<DateTime<Utc>>,
    /// Present when this item is a deliberate resend of an earlier log.
    /// Always references the resend group's root log.
    pub original_log_id: Option<LogId>,
    pub queued_at: DateTime<Utc>,
}

impl QueueItem {
    #[must_use]
    pub fn new(
        envelope: Envelope,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        kind: MessageKind,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            envelope,
            subject: subject.into(),
            html_body: html_body.into(),
            kind,
            locale: locale.into(),
            state: QueueState::Pending,
            attempts: 0,
            last_attempt_at: None,
            not_before: None,
            last_error: None,
            processing_since: None,
            original_log_id: None,
            queued_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    #[must_use]
    pub fn with_original_log(mut self, original: LogId) -> Self {
        self.original_log_id = Some(original);
        self
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.kind.category()
    }

    /// The idempotency key for first sends: `category:correlation_id`.
    ///
    /// `None` for correlation-less kinds, which are deduplicated by the
    /// trailing-window rule instead.
    #[must_use]
    pub fn dedup_key(&self) -> Option<String> {
        self.kind
            .correlation_id()
            .map(|correlation| dedup_key(self.category(), correlation))
    }

    /// Whether the item is ready for a delivery attempt at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == QueueState::Pending && self.not_before.is_none_or(|t| t <= now)
    }
}

/// Canonical dedup key derivation, shared with the log side.
#[must_use]
pub fn dedup_key(category: Category, correlation_id: &str) -> String {
    format!("{category}:{correlation_id}")
}
