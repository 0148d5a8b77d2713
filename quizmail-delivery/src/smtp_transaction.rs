//! One complete SMTP submission.
//!
//! Connects, authenticates, and transmits a single message, with every
//! blocking step wrapped in its own timeout. Expiry or any unexpected
//! reply aborts the attempt; the resulting error carries the offending
//! command and code for the delivery log.

use std::time::Duration;

use chrono::Utc;
use quizmail_common::config::SmtpConfig;
use quizmail_smtp::{SubmissionClient, mime};
use quizmail_store::QueueItem;

use crate::error::{DeliveryError, TemporaryError};
use crate::types::SmtpTimeouts;

/// A single submission attempt for one queue item.
#[derive(Debug)]
pub struct SmtpTransaction<'a> {
    config: &'a SmtpConfig,
    item: &'a QueueItem,
    timeouts: &'a SmtpTimeouts,
}

impl<'a> SmtpTransaction<'a> {
    #[must_use]
    pub const fn new(
        config: &'a SmtpConfig,
        item: &'a QueueItem,
        timeouts: &'a SmtpTimeouts,
    ) -> Self {
        Self {
            config,
            item,
            timeouts,
        }
    }

    /// Run the full dialogue:
    /// greeting → EHLO → AUTH LOGIN → MAIL FROM → RCPT TO → DATA →
    /// headers/body → `.` → QUIT.
    ///
    /// QUIT is best-effort; its failure never invalidates a completed
    /// send.
    ///
    /// # Errors
    /// A classified [`DeliveryError`] from whichever step failed.
    pub async fn execute(self) -> Result<(), DeliveryError> {
        let mut client = self.connect().await?;

        step(self.timeouts.greeting_secs, "greeting", client.greeting()).await?;
        step(
            self.timeouts.ehlo_secs,
            "EHLO",
            client.ehlo(&self.config.ehlo_name),
        )
        .await?;
        step(
            self.timeouts.auth_secs,
            "AUTH LOGIN",
            client.auth_login(&self.config.username, &self.config.password),
        )
        .await?;
        step(
            self.timeouts.mail_from_secs,
            "MAIL FROM",
            client.mail_from(&self.config.sender_address),
        )
        .await?;
        step(
            self.timeouts.rcpt_to_secs,
            "RCPT TO",
            client.rcpt_to(&self.item.envelope.recipient.address),
        )
        .await?;
        step(self.timeouts.data_secs, "DATA", client.data()).await?;

        let message = mime::format_message(
            &self.item.envelope,
            &self.item.subject,
            &self.item.html_body,
            Utc::now(),
        );
        step(
            self.timeouts.data_secs,
            "message data",
            client.send_message(&message),
        )
        .await?;

        let quit_budget = Duration::from_secs(self.timeouts.quit_secs);
        match tokio::time::timeout(quit_budget, client.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    server = %self.config.server_addr(),
                    error = %e,
                    "QUIT failed after successful delivery"
                );
            }
            Err(_) => {
                tracing::warn!(
                    server = %self.config.server_addr(),
                    budget = ?quit_budget,
                    "QUIT timed out after successful delivery"
                );
            }
        }

        Ok(())
    }

    async fn connect(&self) -> Result<SubmissionClient, DeliveryError> {
        let budget = Duration::from_secs(self.timeouts.connect_secs);
        let connecting = SubmissionClient::connect(
            &self.config.host,
            self.config.port,
            self.config.require_tls,
        );

        match tokio::time::timeout(budget, connecting).await {
            Err(_) => Err(DeliveryError::Temporary(TemporaryError::Timeout(format!(
                "connect to {} timed out after {budget:?}",
                self.config.server_addr()
            )))),
            Ok(Err(e)) => {
                // Add which server we were dialing before classification.
                tracing::debug!(
                    server = %self.config.server_addr(),
                    error = %e,
                    "connection attempt failed"
                );
                Err(e.into())
            }
            Ok(Ok(client)) => Ok(client),
        }
    }
}

/// Run one protocol step under its timeout budget.
async fn step<T>(
    budget_secs: u64,
    name: &'static str,
    fut: impl Future<Output = Result<T, quizmail_smtp::ClientError>>,
) -> Result<T, DeliveryError> {
    let budget = Duration::from_secs(budget_secs);
    match tokio::time::timeout(budget, fut).await {
        Err(_) => Err(DeliveryError::Temporary(TemporaryError::Timeout(format!(
            "{name} timed out after {budget:?}"
        )))),
        Ok(result) => result.map_err(Into::into),
    }
}
