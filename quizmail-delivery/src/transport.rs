//! The transport seam between the queue and the wire.
//!
//! The processing loop only ever sees this trait; the real
//! implementation drives an SMTP transaction, tests substitute scripted
//! outcomes.

use async_trait::async_trait;
use quizmail_common::config::SmtpConfig;
use quizmail_store::QueueItem;

use crate::error::{DeliveryError, TemporaryError};
use crate::smtp_transaction::SmtpTransaction;
use crate::types::SmtpTimeouts;

/// Hands one message to a mail server.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Deliver `item` over the configured connection.
    ///
    /// # Errors
    /// A classified [`DeliveryError`]; temporary variants are retried by
    /// the queue manager.
    async fn send(&self, config: &SmtpConfig, item: &QueueItem) -> Result<(), DeliveryError>;
}

/// Production transport: one authenticated SMTP submission per message.
#[derive(Debug, Clone, Default)]
pub struct SmtpTransport {
    timeouts: SmtpTimeouts,
}

impl SmtpTransport {
    #[must_use]
    pub const fn new(timeouts: SmtpTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, config: &SmtpConfig, item: &QueueItem) -> Result<(), DeliveryError> {
        let total = std::time::Duration::from_secs(self.timeouts.total_secs);
        let transaction = SmtpTransaction::new(config, item, &self.timeouts);

        // The per-step budgets inside the transaction normally fire
        // first; this is the hard ceiling on one connection.
        tokio::time::timeout(total, transaction.execute())
            .await
            .map_err(|_| {
                DeliveryError::Temporary(TemporaryError::Timeout(format!(
                    "SMTP transaction exceeded overall budget of {total:?}"
                )))
            })?
    }
}
