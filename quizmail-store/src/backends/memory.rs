//! In-memory backend.
//!
//! Queue items and delivery logs live in two `HashMap`s behind one
//! `RwLock`, so `insert_unique` can check both collections and insert
//! under a single write guard — the transactional insert-if-absent the
//! dedup design requires. Intended for tests and single-process
//! deployments; a relational backend would map each trait method onto
//! one statement and the unique insert onto a keyed constraint.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quizmail_common::message::Category;

use crate::error::{Result, StoreError};
use crate::item::{QueueItem, QueueState};
use crate::log::{DeliveryLog, SendOutcome};
use crate::r#trait::{LogStore, QueueStore};
use crate::types::{LogId, MessageId};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<MessageId, QueueItem>,
    logs: HashMap<LogId, DeliveryLog>,
}

/// Shared-memory implementation of both repository traits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_taken(inner: &Inner, dedup_key: &str) -> bool {
        let queued = inner.items.values().any(|item| {
            matches!(item.state, QueueState::Pending | QueueState::Processing)
                && item.dedup_key().as_deref() == Some(dedup_key)
        });
        if queued {
            return true;
        }

        inner.logs.values().any(|log| {
            log.outcome == SendOutcome::Sent && log.dedup_key().as_deref() == Some(dedup_key)
        })
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn insert(&self, item: QueueItem) -> Result<()> {
        let mut inner = self.inner.write()?;
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id.to_string()));
        }
        inner.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn insert_unique(&self, item: QueueItem, dedup_key: &str) -> Result<()> {
        // Check and insert under one write guard; concurrent producers
        // racing for the same key serialize here.
        let mut inner = self.inner.write()?;
        if Self::key_taken(&inner, dedup_key) {
            tracing::debug!(key = %dedup_key, "insert_unique lost to an existing row");
            return Err(StoreError::Duplicate {
                key: dedup_key.to_string(),
            });
        }
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id.to_string()));
        }
        inner.items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<QueueItem> {
        self.inner
            .read()?
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, item: &QueueItem) -> Result<()> {
        let mut inner = self.inner.write()?;
        if inner.items.contains_key(&item.id) {
            inner.items.insert(item.id.clone(), item.clone());
            Ok(())
        } else {
            Err(StoreError::NotFound(item.id.to_string()))
        }
    }

    async fn remove(&self, id: &MessageId) -> Result<QueueItem> {
        self.inner
            .write()?
            .items
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn due(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<QueueItem>> {
        let inner = self.inner.read()?;
        let mut due: Vec<QueueItem> = inner
            .items
            .values()
            .filter(|item| item.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id)));
        due.truncate(limit);
        Ok(due)
    }

    async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueueItem>> {
        let inner = self.inner.read()?;
        Ok(inner
            .items
            .values()
            .filter(|item| {
                item.state == QueueState::Processing
                    && item.processing_since.is_some_and(|since| since < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<QueueItem>> {
        let inner = self.inner.read()?;
        Ok(inner
            .items
            .values()
            .find(|item| {
                matches!(item.state, QueueState::Pending | QueueState::Processing)
                    && item.dedup_key().as_deref() == Some(dedup_key)
            })
            .cloned())
    }

    async fn find_recent_to(
        &self,
        category: Category,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let inner = self.inner.read()?;
        Ok(inner
            .items
            .values()
            .find(|item| {
                item.category() == category
                    && item.queued_at >= since
                    && (item.envelope.recipient.address == recipient
                        || item.subject.contains(recipient))
            })
            .cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read()?.items.len())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert(&self, log: DeliveryLog) -> Result<()> {
        let mut inner = self.inner.write()?;
        if inner.logs.contains_key(&log.id) {
            return Err(StoreError::AlreadyExists(log.id.to_string()));
        }
        inner.logs.insert(log.id.clone(), log);
        Ok(())
    }

    async fn get(&self, id: &LogId) -> Result<DeliveryLog> {
        self.inner
            .read()?
            .logs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, log: &DeliveryLog) -> Result<()> {
        let mut inner = self.inner.write()?;
        if inner.logs.contains_key(&log.id) {
            inner.logs.insert(log.id.clone(), log.clone());
            Ok(())
        } else {
            Err(StoreError::NotFound(log.id.to_string()))
        }
    }

    async fn find_sent_by_dedup_key(&self, dedup_key: &str) -> Result<Option<DeliveryLog>> {
        let inner = self.inner.read()?;
        Ok(inner
            .logs
            .values()
            .find(|log| {
                log.outcome == SendOutcome::Sent && log.dedup_key().as_deref() == Some(dedup_key)
            })
            .cloned())
    }

    async fn find_recent_to(
        &self,
        category: Category,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DeliveryLog>> {
        let inner = self.inner.read()?;
        Ok(inner
            .logs
            .values()
            .find(|log| {
                log.category() == category
                    && log.sent_at >= since
                    && (log.envelope.recipient.address == recipient
                        || log.subject.contains(recipient))
            })
            .cloned())
    }

    async fn related(&self, root: &LogId) -> Result<Vec<DeliveryLog>> {
        let inner = self.inner.read()?;
        let mut group: Vec<DeliveryLog> = inner
            .logs
            .values()
            .filter(|log| log.group_root() == *root)
            .cloned()
            .collect();
        group.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.id.cmp(&b.id)));
        Ok(group)
    }

    async fn increment_resend_attempts(&self, id: &LogId) -> Result<()> {
        let mut inner = self.inner.write()?;
        let log = inner
            .logs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        log.resend_attempts += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use quizmail_common::envelope::{Envelope, Mailbox};
    use quizmail_common::message::MessageKind;

    use super::*;

    fn user_result(lead: &str) -> QueueItem {
        QueueItem::new(
            Envelope::new(
                Mailbox::new("lead@example.com"),
                Mailbox::new("quiz@example.com"),
            ),
            "Your result",
            "<p>95%</p>",
            MessageKind::UserResult {
                lead_id: lead.to_string(),
                quiz_id: "quiz-7".to_string(),
            },
            "et",
        )
    }

    #[tokio::test]
    async fn insert_unique_rejects_second_writer() {
        let store = MemoryStore::new();
        let first = user_result("lead-42");
        let key = first.dedup_key().expect("has key");

        QueueStore::insert_unique(&store, first, &key)
            .await
            .expect("first insert");

        let err = QueueStore::insert_unique(&store, user_result("lead-42"), &key)
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(QueueStore::len(&store).await.expect("len"), 1);
    }

    #[tokio::test]
    async fn insert_unique_races_to_one_winner() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let item = user_result("lead-42");
                let key = item.dedup_key().expect("has key");
                QueueStore::insert_unique(&store, item, &key).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.expect("join").is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(QueueStore::len(&store).await.expect("len"), 1);
    }

    #[tokio::test]
    async fn sent_log_keeps_blocking_the_key() {
        let store = MemoryStore::new();
        let item = user_result("lead-42");
        let key = item.dedup_key().expect("has key");
        let log = DeliveryLog::from_item(&item, SendOutcome::Sent, Utc::now());
        LogStore::insert(&store, log).await.expect("insert log");

        let err = QueueStore::insert_unique(&store, user_result("lead-42"), &key)
            .await
            .expect_err("blocked by sent log");
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn failed_log_does_not_block_the_key() {
        let store = MemoryStore::new();
        let item = user_result("lead-42");
        let key = item.dedup_key().expect("has key");
        let log = DeliveryLog::from_item(&item, SendOutcome::Failed, Utc::now());
        LogStore::insert(&store, log).await.expect("insert log");

        QueueStore::insert_unique(&store, user_result("lead-42"), &key)
            .await
            .expect("retryable after terminal failure");
    }

    #[tokio::test]
    async fn due_is_oldest_first_and_limited() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut first = user_result("lead-1");
        first.queued_at = now - chrono::Duration::seconds(30);
        let first_id = first.id.clone();
        let mut second = user_result("lead-2");
        second.queued_at = now - chrono::Duration::seconds(20);
        let second_id = second.id.clone();
        let mut held = user_result("lead-3");
        held.not_before = Some(now + chrono::Duration::seconds(60));

        QueueStore::insert(&store, second).await.expect("insert");
        QueueStore::insert(&store, first).await.expect("insert");
        QueueStore::insert(&store, held).await.expect("insert");

        let due = QueueStore::due(&store, 10, now).await.expect("due");
        assert_eq!(
            due.iter().map(|i| i.id.clone()).collect::<Vec<_>>(),
            vec![first_id.clone(), second_id]
        );

        let limited = QueueStore::due(&store, 1, now).await.expect("due");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, first_id);
    }

    #[tokio::test]
    async fn stale_processing_finds_stuck_items() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut stuck = user_result("lead-1");
        stuck.state = QueueState::Processing;
        stuck.processing_since = Some(now - chrono::Duration::minutes(30));
        let stuck_id = stuck.id.clone();

        let mut fresh = user_result("lead-2");
        fresh.state = QueueState::Processing;
        fresh.processing_since = Some(now);

        QueueStore::insert(&store, stuck).await.expect("insert");
        QueueStore::insert(&store, fresh).await.expect("insert");

        let cutoff = now - chrono::Duration::minutes(10);
        let stale = QueueStore::stale_processing(&store, cutoff)
            .await
            .expect("stale");
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, stuck_id);
    }

    #[tokio::test]
    async fn related_returns_the_whole_group() {
        let store = MemoryStore::new();
        let item = user_result("lead-42");
        let root = DeliveryLog::from_item(&item, SendOutcome::Sent, Utc::now());
        let root_id = root.id.clone();

        let mut resend = DeliveryLog::from_item(&item, SendOutcome::Sent, Utc::now());
        resend.original_log_id = Some(root_id.clone());
        let resend_id = resend.id.clone();

        let unrelated = DeliveryLog::from_item(&user_result("lead-9"), SendOutcome::Sent, Utc::now());

        LogStore::insert(&store, root).await.expect("insert");
        LogStore::insert(&store, resend).await.expect("insert");
        LogStore::insert(&store, unrelated).await.expect("insert");

        let group = LogStore::related(&store, &root_id).await.expect("related");
        let ids: Vec<LogId> = group.into_iter().map(|l| l.id).collect();
        assert!(ids.contains(&root_id));
        assert!(ids.contains(&resend_id));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn increment_resend_attempts_bumps_root() {
        let store = MemoryStore::new();
        let root = DeliveryLog::from_item(&user_result("lead-42"), SendOutcome::Sent, Utc::now());
        let root_id = root.id.clone();
        LogStore::insert(&store, root).await.expect("insert");

        LogStore::increment_resend_attempts(&store, &root_id)
            .await
            .expect("bump");
        let fetched = LogStore::get(&store, &root_id).await.expect("get");
        assert_eq!(fetched.resend_attempts, 1);
    }
}
