//! The queue manager: producers enqueue through it, a scheduler drains
//! it, and every outcome is mirrored into the delivery log.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use quizmail_common::audit::AuditSink;
use quizmail_common::config::SmtpConfig;
use quizmail_common::envelope::Mailbox;
use quizmail_store::{
    DeliveryLog, LogId, LogStore, QueueItem, QueueState, QueueStore, SendOutcome, StoreError,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dedup::{DedupGuard, Verdict};
use crate::error::DeliveryError;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::types::{BatchReport, EnqueueOutcome, NewMessage};

/// Default worker-pool width inside one batch, sized to respect
/// provider connection limits.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default time after which an item stuck in `Processing` is considered
/// abandoned by a dead worker.
const DEFAULT_PROCESSING_TIMEOUT_SECS: i64 = 600;

/// Outcome of one worker, aggregated into the batch report.
#[derive(Debug, Clone, Copy)]
enum WorkerOutcome {
    Sent,
    Retried,
    Failed,
}

/// Owns the outbound backlog.
///
/// Cloning is cheap: all heavy state sits behind `Arc`s, which is what
/// lets `process_batch` hand clones to its workers.
#[derive(Debug, Clone)]
pub struct QueueManager {
    queue: Arc<dyn QueueStore>,
    logs: Arc<dyn LogStore>,
    transport: Arc<dyn Transport>,
    /// `None` means the installation has not configured SMTP yet; every
    /// send fails fast with [`DeliveryError::NotConfigured`].
    config: Option<SmtpConfig>,
    guard: DedupGuard,
    policy: RetryPolicy,
    audit: Arc<dyn AuditSink>,
    max_concurrent: usize,
    processing_timeout: Duration,
}

impl QueueManager {
    #[must_use]
    pub fn new(
        queue: Arc<dyn QueueStore>,
        logs: Arc<dyn LogStore>,
        transport: Arc<dyn Transport>,
        config: Option<SmtpConfig>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let guard = DedupGuard::new(Arc::clone(&queue), Arc::clone(&logs));
        Self {
            queue,
            logs,
            transport,
            config,
            guard,
            policy: RetryPolicy::default(),
            audit,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            processing_timeout: Duration::seconds(DEFAULT_PROCESSING_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: DedupGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub const fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }

    /// The sender identity of the current configuration, if any.
    #[must_use]
    pub fn sender_mailbox(&self) -> Option<Mailbox> {
        self.config.as_ref().map(SmtpConfig::sender_mailbox)
    }

    pub(crate) fn log_store(&self) -> &Arc<dyn LogStore> {
        &self.logs
    }

    pub(crate) fn queue_store(&self) -> &Arc<dyn QueueStore> {
        &self.queue
    }

    /// Accept a candidate message into the queue.
    ///
    /// Validation failures and duplicates are values, not errors; only
    /// store faults surface as `Err`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn enqueue(&self, message: NewMessage) -> Result<EnqueueOutcome, StoreError> {
        let envelope = match message.envelope.validated() {
            Ok(envelope) => envelope,
            Err(e) => {
                return Ok(EnqueueOutcome::Invalid {
                    reason: e.to_string(),
                });
            }
        };

        let mut item = QueueItem::new(
            envelope,
            message.subject,
            message.html_body,
            message.kind,
            message.locale,
        );
        if let Some(not_before) = message.not_before {
            item = item.with_not_before(not_before);
        }

        self.insert_guarded(item).await
    }

    /// Queue a deliberate resend of an earlier delivery.
    ///
    /// The new item references the resend group's root, keeping chains
    /// flat: resending a resend still points at the original.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when the log does not exist; other store
    /// failures as-is.
    pub async fn resend(&self, original: &LogId) -> Result<QueueItem, StoreError> {
        let log = self.logs.get(original).await?;
        let root = log.group_root();

        let mut item = QueueItem::new(
            log.envelope.clone(),
            log.subject.clone(),
            log.html_body.clone(),
            log.kind.clone(),
            log.locale.clone(),
        );
        item = item.with_original_log(root);

        self.queue.insert(item.clone()).await?;
        self.audit.record(
            "email_resend_queued",
            &format!(
                "resend of {} ({}) queued for {}",
                log.id,
                log.category(),
                item.envelope.recipient.address
            ),
            Some(&log.id.to_string()),
        );
        Ok(item)
    }

    async fn insert_guarded(&self, item: QueueItem) -> Result<EnqueueOutcome, StoreError> {
        match self.guard.should_send(&item).await? {
            Verdict::Duplicate(reason) => {
                debug!(category = %item.category(), %reason, "candidate rejected as duplicate");
                return Ok(EnqueueOutcome::Duplicate { reason });
            }
            Verdict::Allow => {}
        }

        // The guard read can race a concurrent producer; the keyed
        // insert is what actually decides.
        let outcome = match item.dedup_key() {
            Some(key) => match self.queue.insert_unique(item.clone(), &key).await {
                Ok(()) => EnqueueOutcome::Accepted(item),
                Err(StoreError::Duplicate { key }) => EnqueueOutcome::Duplicate {
                    reason: format!("a message with key {key} already exists"),
                },
                Err(e) => return Err(e),
            },
            None => {
                self.queue.insert(item.clone()).await?;
                EnqueueOutcome::Accepted(item)
            }
        };

        if let EnqueueOutcome::Accepted(item) = &outcome {
            self.audit.record(
                "email_queued",
                &format!(
                    "{} message queued for {}",
                    item.category(),
                    item.envelope.recipient.address
                ),
                item.kind.correlation_id(),
            );
        }
        Ok(outcome)
    }

    /// Drain up to `limit` due items through the transport with a
    /// bounded worker pool.
    ///
    /// One bad message never aborts the batch: every item settles into
    /// `Sent`, rescheduled `Pending`, or terminal `Failed` on its own.
    /// Cancelling the returned future abandons in-flight attempts at
    /// their next await point; those items stay `Processing` until
    /// [`Self::reclaim_stale`] returns them to the queue.
    ///
    /// # Errors
    /// Propagates store failures from the selection phase.
    pub async fn process_batch(&self, limit: usize) -> Result<BatchReport, StoreError> {
        let now = Utc::now();
        let due = self.queue.due(limit, now).await?;
        let mut report = BatchReport {
            selected: due.len(),
            ..BatchReport::default()
        };

        if due.is_empty() {
            return Ok(report);
        }

        info!(
            selected = due.len(),
            max_concurrent = self.max_concurrent,
            "processing delivery batch"
        );

        let mut join_set: JoinSet<WorkerOutcome> = JoinSet::new();
        let mut pending = due.into_iter();

        loop {
            while join_set.len() < self.max_concurrent {
                let Some(item) = pending.next() else { break };
                let manager = self.clone();
                join_set.spawn(async move { manager.process_one(item).await });
            }

            match join_set.join_next().await {
                Some(Ok(outcome)) => match outcome {
                    WorkerOutcome::Sent => report.sent += 1,
                    WorkerOutcome::Retried => report.retried += 1,
                    WorkerOutcome::Failed => report.failed += 1,
                },
                Some(Err(e)) => warn!(error = %e, "delivery worker panicked"),
                None => break,
            }
        }

        Ok(report)
    }

    /// Return items stuck in `Processing` past the timeout to `Pending`.
    ///
    /// Crashed or cancelled workers leave their item mid-flight; an
    /// external scheduler runs this sweeper alongside the batches.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn reclaim_stale(&self) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - self.processing_timeout;
        let stale = self.queue.stale_processing(cutoff).await?;
        let count = stale.len();

        for mut item in stale {
            warn!(
                message_id = %item.id,
                since = ?item.processing_since,
                "reclaiming item stuck in processing"
            );
            item.state = QueueState::Pending;
            item.processing_since = None;
            self.queue.update(&item).await?;
        }

        Ok(count)
    }

    async fn process_one(&self, mut item: QueueItem) -> WorkerOutcome {
        let started = Instant::now();
        let now = Utc::now();

        // Claim the item. Each attempt counts, successful or not.
        item.state = QueueState::Processing;
        item.processing_since = Some(now);
        item.attempts += 1;
        item.last_attempt_at = Some(now);
        if let Err(e) = self.queue.update(&item).await {
            warn!(message_id = %item.id, error = %e, "failed to claim queue item");
            return WorkerOutcome::Failed;
        }

        let result = match &self.config {
            None => Err(DeliveryError::NotConfigured),
            Some(config) => self.transport.send(config, &item).await,
        };

        let elapsed_ms = started.elapsed().as_millis();
        match result {
            Ok(()) => {
                self.finish_sent(item, elapsed_ms).await;
                WorkerOutcome::Sent
            }
            Err(e) => self.handle_failure(item, &e, elapsed_ms).await,
        }
    }

    async fn finish_sent(&self, mut item: QueueItem, elapsed_ms: u128) {
        item.state = QueueState::Sent;
        item.last_error = None;

        let log = DeliveryLog::from_item(&item, SendOutcome::Sent, Utc::now());
        let log_id = log.id.clone();

        if let Err(e) = self.logs.insert(log).await {
            warn!(message_id = %item.id, error = %e, "failed to write sent delivery log");
        } else if let Some(original) = &item.original_log_id
            && let Err(e) = self.logs.increment_resend_attempts(original).await
        {
            warn!(original = %original, error = %e, "failed to bump resend counter");
        }

        if let Err(e) = self.queue.remove(&item.id).await {
            warn!(message_id = %item.id, error = %e, "failed to archive sent queue item");
        }

        info!(
            message_id = %item.id,
            log_id = %log_id,
            category = %item.category(),
            attempts = item.attempts,
            elapsed_ms,
            "message delivered"
        );
        self.audit.record(
            "email_sent",
            &format!(
                "{} message to {} delivered in {elapsed_ms}ms (attempt {})",
                item.category(),
                item.envelope.recipient.address,
                item.attempts
            ),
            item.kind.correlation_id(),
        );
    }

    async fn handle_failure(
        &self,
        mut item: QueueItem,
        error: &DeliveryError,
        elapsed_ms: u128,
    ) -> WorkerOutcome {
        item.last_error = Some(error.to_string());
        item.processing_since = None;

        let retry = error.is_retryable() && self.policy.should_retry(item.attempts);
        let outcome = if retry {
            let now = Utc::now();
            item.state = QueueState::Pending;
            item.not_before = Some(self.policy.next_attempt_at(item.attempts, now));
            debug!(
                message_id = %item.id,
                attempts = item.attempts,
                not_before = ?item.not_before,
                error = %error,
                "delivery failed, rescheduled"
            );
            WorkerOutcome::Retried
        } else {
            item.state = QueueState::Failed;
            warn!(
                message_id = %item.id,
                attempts = item.attempts,
                error = %error,
                "delivery failed terminally"
            );

            // Terminal failures are auditable: mirror into a failed log.
            let log = DeliveryLog::from_item(&item, SendOutcome::Failed, Utc::now());
            if let Err(e) = self.logs.insert(log).await {
                warn!(message_id = %item.id, error = %e, "failed to write failed delivery log");
            } else if let Some(original) = &item.original_log_id
                && let Err(e) = self.logs.increment_resend_attempts(original).await
            {
                warn!(original = %original, error = %e, "failed to bump resend counter");
            }
            WorkerOutcome::Failed
        };

        if let Err(e) = self.queue.update(&item).await {
            warn!(message_id = %item.id, error = %e, "failed to persist failure state");
        }

        self.audit.record(
            "email_failed",
            &format!(
                "{} message to {} failed after {elapsed_ms}ms (attempt {}): {error}",
                item.category(),
                item.envelope.recipient.address,
                item.attempts
            ),
            item.kind.correlation_id(),
        );
        outcome
    }
}
