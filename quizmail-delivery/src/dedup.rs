//! Duplicate-send guard.
//!
//! Two policies, evaluated in order:
//! 1. Correlation-keyed idempotency: at most one first send ever exists
//!    per `(category, correlation id)` pair, counting live queue items
//!    and successfully sent logs.
//! 2. Trailing-window similarity for correlation-less candidates
//!    (test sends, reputation alerts): reject when a message of the same
//!    category for the same recipient was produced within the window.
//!
//! Deliberate resends bypass rule 1 — the caller already supplied the
//! original log id.
//!
//! The guard only reads. Two producers can both pass `should_send` for
//! the same key in a race; the store's transactional `insert_unique`
//! settles who wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use quizmail_store::{LogStore, QueueItem, QueueStore, StoreError};

/// Guard decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Duplicate(String),
}

impl Verdict {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Read-only duplicate probe over both stores.
#[derive(Debug, Clone)]
pub struct DedupGuard {
    queue: Arc<dyn QueueStore>,
    logs: Arc<dyn LogStore>,
    /// Trailing window for rule 2.
    window: Duration,
}

impl DedupGuard {
    /// Default trailing window for correlation-less duplicates.
    pub const DEFAULT_WINDOW_SECS: i64 = 60;

    #[must_use]
    pub fn new(queue: Arc<dyn QueueStore>, logs: Arc<dyn LogStore>) -> Self {
        Self {
            queue,
            logs,
            window: Duration::seconds(Self::DEFAULT_WINDOW_SECS),
        }
    }

    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Decide whether `candidate` may be queued.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn should_send(&self, candidate: &QueueItem) -> Result<Verdict, StoreError> {
        // Deliberate resend: the caller asked for it and carries the
        // original log id, so first-send idempotency does not apply.
        if candidate.original_log_id.is_some() {
            return Ok(Verdict::Allow);
        }

        if let Some(key) = candidate.dedup_key() {
            return self.check_correlation(&key).await;
        }

        self.check_window(candidate, Utc::now()).await
    }

    async fn check_correlation(&self, key: &str) -> Result<Verdict, StoreError> {
        if self.queue.find_by_dedup_key(key).await?.is_some() {
            return Ok(Verdict::Duplicate(format!(
                "a message with key {key} is already queued"
            )));
        }

        if self.logs.find_sent_by_dedup_key(key).await?.is_some() {
            return Ok(Verdict::Duplicate(format!(
                "a message with key {key} was already sent"
            )));
        }

        Ok(Verdict::Allow)
    }

    async fn check_window(
        &self,
        candidate: &QueueItem,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StoreError> {
        let since = now - self.window;
        let category = candidate.category();
        let recipient = candidate.envelope.recipient.address.as_str();

        if self
            .queue
            .find_recent_to(category, recipient, since)
            .await?
            .is_some()
            || self
                .logs
                .find_recent_to(category, recipient, since)
                .await?
                .is_some()
        {
            return Ok(Verdict::Duplicate(format!(
                "a {category} message to {recipient} was produced within the last {}s",
                self.window.num_seconds()
            )));
        }

        Ok(Verdict::Allow)
    }
}
