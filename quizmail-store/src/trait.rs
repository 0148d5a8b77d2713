//! Repository traits over the queue and log collections.
//!
//! The queue manager and status tracker are written against these traits
//! only. The in-memory backend in [`crate::backends`] implements both on
//! one shared structure so that [`QueueStore::insert_unique`] can check
//! live queue items *and* sent logs under a single write lock — that
//! method is the only point of true mutual exclusion in the subsystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quizmail_common::message::Category;

use crate::error::Result;
use crate::item::QueueItem;
use crate::log::DeliveryLog;
use crate::types::{LogId, MessageId};

/// Store of messages not yet durably delivered.
#[async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug {
    /// Insert unconditionally (resends, correlation-less messages).
    async fn insert(&self, item: QueueItem) -> Result<()>;

    /// Insert if and only if no live queue item and no sent log already
    /// claims `dedup_key`. Atomic with respect to concurrent producers.
    ///
    /// # Errors
    /// [`crate::StoreError::Duplicate`] if the key is taken.
    async fn insert_unique(&self, item: QueueItem, dedup_key: &str) -> Result<()>;

    async fn get(&self, id: &MessageId) -> Result<QueueItem>;

    /// Overwrite an existing item.
    async fn update(&self, item: &QueueItem) -> Result<()>;

    /// Remove and return an item (archival into the log store is the
    /// caller's job).
    async fn remove(&self, id: &MessageId) -> Result<QueueItem>;

    /// Up to `limit` pending items whose `not_before` has passed,
    /// oldest first.
    async fn due(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<QueueItem>>;

    /// Items stuck in `Processing` since before `cutoff`.
    async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueueItem>>;

    /// A live (pending or processing) item with the given dedup key.
    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<QueueItem>>;

    /// A queue item of `category` addressed to `recipient` created at or
    /// after `since` — the trailing-window duplicate probe for
    /// correlation-less producers.
    async fn find_recent_to(
        &self,
        category: Category,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<QueueItem>>;

    async fn len(&self) -> Result<usize>;
}

/// Store of permanent delivery records.
#[async_trait]
pub trait LogStore: Send + Sync + std::fmt::Debug {
    async fn insert(&self, log: DeliveryLog) -> Result<()>;

    async fn get(&self, id: &LogId) -> Result<DeliveryLog>;

    /// Overwrite an existing log (status tracker only).
    async fn update(&self, log: &DeliveryLog) -> Result<()>;

    /// A successfully sent log with the given dedup key.
    async fn find_sent_by_dedup_key(&self, dedup_key: &str) -> Result<Option<DeliveryLog>>;

    /// Log-side counterpart of [`QueueStore::find_recent_to`].
    async fn find_recent_to(
        &self,
        category: Category,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DeliveryLog>>;

    /// Every log in a resend group: the root itself plus all logs whose
    /// `original_log_id` equals `root`, ordered by send time.
    async fn related(&self, root: &LogId) -> Result<Vec<DeliveryLog>>;

    /// Bump the root's resend counter when a resend log is written.
    async fn increment_resend_attempts(&self, id: &LogId) -> Result<()>;
}
