//! Query surface for the admin panel's delivery timeline.
//!
//! Kept behind a trait so the UI-facing layer depends on an interface,
//! not on the queue manager's full API.

use async_trait::async_trait;
use quizmail_store::{DeliveryLog, LogId, StoreError};

use crate::manager::QueueManager;

/// Read-only view over delivery history.
#[async_trait]
pub trait DeliveryQuery: Send + Sync {
    /// Fetch one delivery log.
    async fn get_log(&self, id: &LogId) -> Result<DeliveryLog, StoreError>;

    /// Fetch every log in the resend group of `id`: the original plus
    /// all resends, whichever of them `id` names.
    async fn related_logs(&self, id: &LogId) -> Result<Vec<DeliveryLog>, StoreError>;

    /// Number of messages currently in the queue.
    async fn queue_len(&self) -> Result<usize, StoreError>;
}

#[async_trait]
impl DeliveryQuery for QueueManager {
    async fn get_log(&self, id: &LogId) -> Result<DeliveryLog, StoreError> {
        self.log_store().get(id).await
    }

    async fn related_logs(&self, id: &LogId) -> Result<Vec<DeliveryLog>, StoreError> {
        let log = self.log_store().get(id).await?;
        self.log_store().related(&log.group_root()).await
    }

    async fn queue_len(&self) -> Result<usize, StoreError> {
        self.queue_store().len().await
    }
}
