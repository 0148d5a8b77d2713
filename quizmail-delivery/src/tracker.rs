//! Reconciles asynchronous provider events onto delivery logs.
//!
//! The per-log state machine:
//!
//! ```text
//! (sent) ──> delivered ──> opened ──> clicked
//!    │
//!    ├─────> bounced     (terminal)
//!    └─────> complained  (terminal)
//! ```
//!
//! `opened`/`clicked` are counters, not replacements: re-opening
//! increments `open_count` and moves `opened_at` forward while
//! `first_opened_at` keeps the first sighting. Terminal states are never
//! rewound to a healthier one. A hard bounce is authoritative even after
//! `delivered`; a soft bounce arriving after delivery is retained as a
//! side event without touching `delivery_status`. Every event the
//! tracker sees for an existing log — including rejected ones — is
//! appended to the log's event trail for audit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quizmail_common::audit::AuditSink;
use quizmail_store::{
    BounceKind, DeliveryEvent, DeliveryEventKind, DeliveryLog, DeliveryState, EventDetail, LogId,
    LogStore, StoreError,
};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced to the event-ingestion pipeline. Neither is fatal to
/// it; `InvalidTransition` events are still stored on the log.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No delivery log with this id.
    #[error("delivery log not found: {0}")]
    NotFound(LogId),

    /// The event would violate the state machine; it was recorded on
    /// the log's event trail but `delivery_status` was left alone.
    #[error("invalid transition: {event:?} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: DeliveryEventKind,
    },

    /// Store failure while reading or writing the log.
    #[error("store error: {0}")]
    Store(StoreError),
}

/// How an accepted event affected the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// `delivery_status`, a counter, or a timestamp changed.
    Updated,
    /// Stored on the event trail only (idempotent repeat, post-terminal
    /// arrival, soft bounce after delivery).
    Recorded,
}

/// Applies provider events to the log store.
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    logs: Arc<dyn LogStore>,
    audit: Arc<dyn AuditSink>,
}

impl DeliveryTracker {
    #[must_use]
    pub const fn new(logs: Arc<dyn LogStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { logs, audit }
    }

    /// Apply one provider event to the log `id`.
    ///
    /// # Errors
    /// [`TrackerError::NotFound`] for unknown logs;
    /// [`TrackerError::InvalidTransition`] when the event violates the
    /// state machine (the event is still stored); store faults as
    /// [`TrackerError::Store`].
    pub async fn apply_event(
        &self,
        id: &LogId,
        kind: DeliveryEventKind,
        at: DateTime<Utc>,
        detail: EventDetail,
    ) -> Result<Applied, TrackerError> {
        let mut log = match self.logs.get(id).await {
            Ok(log) => log,
            Err(StoreError::NotFound(_)) => return Err(TrackerError::NotFound(id.clone())),
            Err(e) => return Err(TrackerError::Store(e)),
        };

        let decision = transition(&mut log, kind, at, &detail);

        // The trail keeps everything, valid or not.
        log.events.push(DeliveryEvent {
            kind,
            at,
            detail: detail.clone(),
        });
        self.logs
            .update(&log)
            .await
            .map_err(TrackerError::Store)?;

        self.audit.record(
            "email_delivery_event",
            &format!(
                "{kind:?} event on log {id} ({})",
                match &decision {
                    Ok(Applied::Updated) => "status updated",
                    Ok(Applied::Recorded) => "recorded only",
                    Err(_) => "invalid transition",
                }
            ),
            Some(&id.to_string()),
        );

        debug!(log_id = %id, event = ?kind, status = ?log.delivery_status, "delivery event applied");
        decision
    }
}

const fn status_name(status: Option<DeliveryState>) -> &'static str {
    match status {
        None => "sent",
        Some(DeliveryState::Delivered) => "delivered",
        Some(DeliveryState::Bounced) => "bounced",
        Some(DeliveryState::Complained) => "complained",
        Some(DeliveryState::Opened) => "opened",
        Some(DeliveryState::Clicked) => "clicked",
    }
}

/// The pure state-machine step: mutates `log` and reports what happened.
fn transition(
    log: &mut DeliveryLog,
    kind: DeliveryEventKind,
    at: DateTime<Utc>,
    detail: &EventDetail,
) -> Result<Applied, TrackerError> {
    let current = log.delivery_status;
    let from = status_name(current);

    match kind {
        DeliveryEventKind::Delivered => match current {
            None => {
                log.delivery_status = Some(DeliveryState::Delivered);
                log.delivered_at = Some(at);
                Ok(Applied::Updated)
            }
            // Repeat or late notification; nothing to rewind.
            Some(DeliveryState::Delivered | DeliveryState::Opened | DeliveryState::Clicked) => {
                Ok(Applied::Recorded)
            }
            Some(DeliveryState::Bounced | DeliveryState::Complained) => {
                Err(TrackerError::InvalidTransition { from, event: kind })
            }
        },

        DeliveryEventKind::Bounced => {
            let bounce = detail.bounce;
            match current {
                Some(DeliveryState::Bounced | DeliveryState::Complained) => Ok(Applied::Recorded),
                // Late bounce after a delivery signal: only a hard
                // bounce overrides; soft stays a side event.
                Some(DeliveryState::Delivered | DeliveryState::Opened | DeliveryState::Clicked)
                    if bounce != Some(BounceKind::Hard) =>
                {
                    Ok(Applied::Recorded)
                }
                _ => {
                    log.delivery_status = Some(DeliveryState::Bounced);
                    log.bounced_at = Some(at);
                    log.bounce_kind = bounce;
                    log.bounce_reason.clone_from(&detail.reason);
                    Ok(Applied::Updated)
                }
            }
        }

        DeliveryEventKind::Complained => match current {
            Some(DeliveryState::Bounced | DeliveryState::Complained) => Ok(Applied::Recorded),
            _ => {
                log.delivery_status = Some(DeliveryState::Complained);
                log.complained_at = Some(at);
                Ok(Applied::Updated)
            }
        },

        DeliveryEventKind::Opened => match current {
            Some(DeliveryState::Delivered | DeliveryState::Opened | DeliveryState::Clicked) => {
                log.open_count += 1;
                log.opened_at = Some(at);
                if log.first_opened_at.is_none() {
                    log.first_opened_at = Some(at);
                }
                // A later open never demotes a clicked log.
                if log.delivery_status != Some(DeliveryState::Clicked) {
                    log.delivery_status = Some(DeliveryState::Opened);
                }
                Ok(Applied::Updated)
            }
            None => Err(TrackerError::InvalidTransition { from, event: kind }),
            Some(DeliveryState::Bounced | DeliveryState::Complained) => {
                Err(TrackerError::InvalidTransition { from, event: kind })
            }
        },

        DeliveryEventKind::Clicked => match current {
            Some(DeliveryState::Opened | DeliveryState::Clicked) => {
                log.click_count += 1;
                log.clicked_at = Some(at);
                log.delivery_status = Some(DeliveryState::Clicked);
                Ok(Applied::Updated)
            }
            None | Some(DeliveryState::Delivered) => {
                Err(TrackerError::InvalidTransition { from, event: kind })
            }
            Some(DeliveryState::Bounced | DeliveryState::Complained) => {
                Err(TrackerError::InvalidTransition { from, event: kind })
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use quizmail_common::audit::TracingAuditSink;
    use quizmail_common::envelope::{Envelope, Mailbox};
    use quizmail_common::message::MessageKind;
    use quizmail_store::{MemoryStore, QueueItem, SendOutcome};

    use super::*;

    async fn tracker_with_log() -> (DeliveryTracker, Arc<MemoryStore>, LogId) {
        let store = Arc::new(MemoryStore::new());
        let item = QueueItem::new(
            Envelope::new(
                Mailbox::new("lead@example.com"),
                Mailbox::new("quiz@example.com"),
            ),
            "Your result",
            "<p>95%</p>",
            MessageKind::UserResult {
                lead_id: "lead-42".to_string(),
                quiz_id: "quiz-7".to_string(),
            },
            "et",
        );
        let log = DeliveryLog::from_item(&item, SendOutcome::Sent, Utc::now());
        let id = log.id.clone();
        LogStore::insert(store.as_ref(), log).await.expect("insert");

        let tracker = DeliveryTracker::new(
            Arc::clone(&store) as Arc<dyn LogStore>,
            Arc::new(TracingAuditSink),
        );
        (tracker, store, id)
    }

    async fn fetch(store: &MemoryStore, id: &LogId) -> DeliveryLog {
        LogStore::get(store, id).await.expect("get")
    }

    #[tokio::test]
    async fn delivered_then_opened_then_clicked() {
        let (tracker, store, id) = tracker_with_log().await;
        let t0 = Utc::now();

        let applied = tracker
            .apply_event(&id, DeliveryEventKind::Delivered, t0, EventDetail::default())
            .await
            .expect("delivered");
        assert_eq!(applied, Applied::Updated);

        tracker
            .apply_event(&id, DeliveryEventKind::Opened, t0, EventDetail::default())
            .await
            .expect("opened");
        tracker
            .apply_event(&id, DeliveryEventKind::Clicked, t0, EventDetail::default())
            .await
            .expect("clicked");

        let log = fetch(&store, &id).await;
        assert_eq!(log.delivery_status, Some(DeliveryState::Clicked));
        assert_eq!(log.open_count, 1);
        assert_eq!(log.click_count, 1);
        assert_eq!(log.events.len(), 3);
    }

    #[tokio::test]
    async fn reopening_increments_and_keeps_first_seen() {
        let (tracker, store, id) = tracker_with_log().await;
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::minutes(10);

        tracker
            .apply_event(&id, DeliveryEventKind::Delivered, t0, EventDetail::default())
            .await
            .expect("delivered");
        tracker
            .apply_event(&id, DeliveryEventKind::Opened, t0, EventDetail::default())
            .await
            .expect("first open");
        tracker
            .apply_event(&id, DeliveryEventKind::Opened, t1, EventDetail::default())
            .await
            .expect("second open");

        let log = fetch(&store, &id).await;
        assert_eq!(log.open_count, 2);
        assert_eq!(log.first_opened_at, Some(t0));
        assert_eq!(log.opened_at, Some(t1));
    }

    #[tokio::test]
    async fn terminal_bounce_is_preserved() {
        let (tracker, store, id) = tracker_with_log().await;
        let t0 = Utc::now();

        tracker
            .apply_event(
                &id,
                DeliveryEventKind::Bounced,
                t0,
                EventDetail::bounce(BounceKind::Hard).with_reason("mailbox gone"),
            )
            .await
            .expect("bounce");

        let err = tracker
            .apply_event(&id, DeliveryEventKind::Delivered, t0, EventDetail::default())
            .await
            .expect_err("must not heal");
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        let log = fetch(&store, &id).await;
        assert_eq!(log.delivery_status, Some(DeliveryState::Bounced));
        assert_eq!(log.bounce_kind, Some(BounceKind::Hard));
        assert_eq!(log.bounce_reason.as_deref(), Some("mailbox gone"));
        // the rejected event is still on the trail
        assert_eq!(log.events.len(), 2);
    }

    #[tokio::test]
    async fn soft_bounce_after_delivery_is_a_side_event() {
        let (tracker, store, id) = tracker_with_log().await;
        let t0 = Utc::now();

        tracker
            .apply_event(&id, DeliveryEventKind::Delivered, t0, EventDetail::default())
            .await
            .expect("delivered");
        let applied = tracker
            .apply_event(
                &id,
                DeliveryEventKind::Bounced,
                t0,
                EventDetail::bounce(BounceKind::Soft),
            )
            .await
            .expect("soft bounce accepted");
        assert_eq!(applied, Applied::Recorded);

        let log = fetch(&store, &id).await;
        assert_eq!(log.delivery_status, Some(DeliveryState::Delivered));
        assert_eq!(log.events.len(), 2);
    }

    #[tokio::test]
    async fn hard_bounce_after_delivery_overrides() {
        let (tracker, store, id) = tracker_with_log().await;
        let t0 = Utc::now();

        tracker
            .apply_event(&id, DeliveryEventKind::Delivered, t0, EventDetail::default())
            .await
            .expect("delivered");
        let applied = tracker
            .apply_event(
                &id,
                DeliveryEventKind::Bounced,
                t0,
                EventDetail::bounce(BounceKind::Hard),
            )
            .await
            .expect("hard bounce");
        assert_eq!(applied, Applied::Updated);

        let log = fetch(&store, &id).await;
        assert_eq!(log.delivery_status, Some(DeliveryState::Bounced));
    }

    #[tokio::test]
    async fn open_before_delivery_is_invalid_but_stored() {
        let (tracker, store, id) = tracker_with_log().await;

        let err = tracker
            .apply_event(
                &id,
                DeliveryEventKind::Opened,
                Utc::now(),
                EventDetail::default(),
            )
            .await
            .expect_err("out of order");
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        let log = fetch(&store, &id).await;
        assert_eq!(log.delivery_status, None);
        assert_eq!(log.events.len(), 1);
    }

    #[tokio::test]
    async fn unknown_log_is_not_found() {
        let (tracker, _store, _id) = tracker_with_log().await;
        let err = tracker
            .apply_event(
                &LogId::generate(),
                DeliveryEventKind::Delivered,
                Utc::now(),
                EventDetail::default(),
            )
            .await
            .expect_err("missing log");
        assert!(matches!(err, TrackerError::NotFound(_)));
    }
}
