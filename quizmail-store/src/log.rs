//! Durable record of an attempted-or-completed send.
//!
//! A log row is written exactly once, when a queue item finishes
//! processing, and from then on only the status tracker may touch it —
//! and only to add information. Provider events never rewind a terminal
//! delivery state; everything that arrives is retained in the
//! append-only event trail regardless of whether it moved the status.

use chrono::{DateTime, Utc};
use quizmail_common::envelope::Envelope;
use quizmail_common::message::{Category, MessageKind};
use serde::{Deserialize, Serialize};

use crate::item::{QueueItem, dedup_key};
use crate::types::{LogId, MessageId};

/// Outcome of the SMTP attempt that produced this log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Sent,
    Failed,
}

/// Asynchronous delivery status reported by the provider after a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Delivered,
    Bounced,
    Complained,
    Opened,
    Clicked,
}

/// Bounce classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceKind {
    Hard,
    Soft,
}

/// Kind of a provider event fed to the status tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventKind {
    Delivered,
    Bounced,
    Complained,
    Opened,
    Clicked,
}

/// Free-form detail attached to a provider event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce: Option<BounceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EventDetail {
    #[must_use]
    pub const fn bounce(kind: BounceKind) -> Self {
        Self {
            bounce: Some(kind),
            reason: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One entry in a log's append-only event trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub kind: DeliveryEventKind,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub detail: EventDetail,
}

/// Frozen record of one send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub id: LogId,
    /// The queue item this log was mirrored from.
    pub message_id: MessageId,
    pub envelope: Envelope,
    pub subject: String,
    pub html_body: String,
    pub kind: MessageKind,
    pub locale: String,
    pub outcome: SendOutcome,
    /// Last transport error, for failed sends.
    pub error: Option<String>,
    /// Attempt count at the time the item finished processing.
    pub attempts: u32,
    pub sent_at: DateTime<Utc>,

    /// How many resend logs reference this one. Only ever non-zero on a
    /// group root.
    pub resend_attempts: u32,
    /// Back-reference to the resend group's root; `None` on the root
    /// itself. The chain is flat by construction — a root never has a
    /// non-null back-reference of its own.
    pub original_log_id: Option<LogId>,

    pub delivery_status: Option<DeliveryState>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub complained_at: Option<DateTime<Utc>>,
    /// Most recent open; the first open is kept separately.
    pub opened_at: Option<DateTime<Utc>>,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounce_kind: Option<BounceKind>,
    pub bounce_reason: Option<String>,
    pub open_count: u32,
    pub click_count: u32,

    /// Every accepted provider event, in arrival order, including ones
    /// that did not (or were not allowed to) change `delivery_status`.
    pub events: Vec<DeliveryEvent>,
}

impl DeliveryLog {
    /// Freeze a finished queue item into a log row.
    #[must_use]
    pub fn from_item(item: &QueueItem, outcome: SendOutcome, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: LogId::generate(),
            message_id: item.id.clone(),
            envelope: item.envelope.clone(),
            subject: item.subject.clone(),
            html_body: item.html_body.clone(),
            kind: item.kind.clone(),
            locale: item.locale.clone(),
            outcome,
            error: item.last_error.clone(),
            attempts: item.attempts,
            sent_at,
            resend_attempts: 0,
            original_log_id: item.original_log_id.clone(),
            delivery_status: None,
            delivered_at: None,
            bounced_at: None,
            complained_at: None,
            opened_at: None,
            first_opened_at: None,
            clicked_at: None,
            bounce_kind: None,
            bounce_reason: None,
            open_count: 0,
            click_count: 0,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.kind.category()
    }

    /// Dedup key, derived the same way as on the queue side.
    #[must_use]
    pub fn dedup_key(&self) -> Option<String> {
        self.kind
            .correlation_id()
            .map(|correlation| dedup_key(self.category(), correlation))
    }

    /// The resend group this log belongs to: its own id for a root, the
    /// back-reference for a resend. Turns the "related logs" lookup into
    /// a single equality query.
    #[must_use]
    pub fn group_root(&self) -> LogId {
        self.original_log_id.clone().unwrap_or_else(|| self.id.clone())
    }

    /// Whether `delivery_status` is terminal (never rewound to a
    /// healthier state).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.delivery_status,
            Some(DeliveryState::Bounced | DeliveryState::Complained)
        )
    }
}
