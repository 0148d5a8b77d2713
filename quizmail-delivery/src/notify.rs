//! Domain-reputation alert producer.
//!
//! A periodic upstream job checks the sending domain against blacklists
//! and records a status. This producer decides whether that status
//! change warrants an admin alert, with a hysteresis rule to avoid
//! alert storms: notify on entering a degraded band, stay quiet while
//! the band persists, and re-arm only once the status returns to clean.
//! The decision reads the immediately preceding recorded status — never
//! a time window.

use std::sync::Arc;

use quizmail_common::envelope::{Envelope, Mailbox};
use quizmail_common::message::{Category, MessageKind};
use quizmail_common::traits::{AdminDirectory, TemplateRenderer};
use quizmail_store::StoreError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::manager::QueueManager;
use crate::types::NewMessage;

/// Result band of one reputation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationStatus {
    Clean,
    Warning,
    Danger,
}

impl ReputationStatus {
    /// Whether this band warrants operator attention.
    #[must_use]
    pub const fn is_alerting(self) -> bool {
        matches!(self, Self::Warning | Self::Danger)
    }
}

/// What [`ReputationNotifier::maybe_notify`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Alerts were queued for this many admin recipients.
    Enqueued(usize),
    Skipped(String),
}

/// Watches reputation transitions and produces admin alerts.
#[derive(Debug, Clone)]
pub struct ReputationNotifier {
    manager: QueueManager,
    templates: Arc<dyn TemplateRenderer>,
    admins: Arc<dyn AdminDirectory>,
    sender: Mailbox,
    locale: String,
}

impl ReputationNotifier {
    #[must_use]
    pub fn new(
        manager: QueueManager,
        templates: Arc<dyn TemplateRenderer>,
        admins: Arc<dyn AdminDirectory>,
        sender: Mailbox,
    ) -> Self {
        Self {
            manager,
            templates,
            admins,
            sender,
            locale: "en".to_string(),
        }
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Decide whether the transition `previous → new_status` for
    /// `domain` should alert, and enqueue alerts if so.
    ///
    /// Notifies only on a transition *into* a degraded band from a band
    /// that was not degraded (a first-ever check counts). While the
    /// status stays degraded — including warning → danger — no further
    /// alerts are produced until it recovers to clean first.
    ///
    /// # Errors
    /// Propagates store failures from the enqueue path.
    pub async fn maybe_notify(
        &self,
        domain: &str,
        new_status: ReputationStatus,
        previous: Option<ReputationStatus>,
    ) -> Result<NotifyOutcome, StoreError> {
        if !new_status.is_alerting() {
            debug!(%domain, ?new_status, "reputation fine, nothing to report");
            return Ok(NotifyOutcome::Skipped("status is not degraded".to_string()));
        }

        if previous.is_some_and(ReputationStatus::is_alerting) {
            debug!(%domain, ?new_status, ?previous, "already alerting, holding until recovery");
            return Ok(NotifyOutcome::Skipped(
                "an alert for this degradation was already raised".to_string(),
            ));
        }

        let recipients = self.admins.admin_recipients();
        if recipients.is_empty() {
            return Ok(NotifyOutcome::Skipped(
                "no admin recipients configured".to_string(),
            ));
        }

        let rendered = self
            .templates
            .render(Category::DomainReputationAlert, &self.locale);

        let mut enqueued = 0;
        for recipient in recipients {
            let message = NewMessage::new(
                Envelope::new(recipient, self.sender.clone()),
                rendered.subject.clone(),
                rendered.html.clone(),
                MessageKind::DomainReputationAlert {
                    domain: domain.to_string(),
                },
                self.locale.clone(),
            );
            if self.manager.enqueue(message).await?.is_accepted() {
                enqueued += 1;
            }
        }

        info!(%domain, ?new_status, enqueued, "reputation alert raised");
        Ok(NotifyOutcome::Enqueued(enqueued))
    }
}
