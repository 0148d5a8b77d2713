//! Shared fixtures for delivery integration tests.

#![allow(dead_code)] // not every helper is used by every test binary

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quizmail_common::audit::AuditSink;
use quizmail_common::config::SmtpConfig;
use quizmail_common::envelope::Mailbox;
use quizmail_common::message::Category;
use quizmail_common::traits::{AdminDirectory, RenderedTemplate, TemplateRenderer};
use quizmail_delivery::{DeliveryError, Transport};
use quizmail_smtp::ClientError;
use quizmail_store::QueueItem;

/// One scripted transport outcome.
#[derive(Debug, Clone, Copy)]
pub enum StubOutcome {
    Success,
    /// Connection-level failure; retryable.
    Temporary,
    /// Server rejection with this reply code on RCPT TO.
    Permanent(u16),
}

/// Transport double that plays back a script and counts calls.
/// An exhausted script keeps succeeding.
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    script: Arc<Mutex<VecDeque<StubOutcome>>>,
    calls: Arc<AtomicUsize>,
}

impl StubTransport {
    pub fn always_succeeding() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = StubOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, _config: &SmtpConfig, _item: &QueueItem) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or(StubOutcome::Success);

        match outcome {
            StubOutcome::Success => Ok(()),
            StubOutcome::Temporary => Err(ClientError::ConnectionClosed.into()),
            StubOutcome::Permanent(code) => Err(ClientError::UnexpectedReply {
                command: "RCPT TO",
                code,
                message: "rejected".to_string(),
            }
            .into()),
        }
    }
}

/// Audit sink that remembers everything it was told.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudit {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|(action, _)| action).collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, action: &str, description: &str, _entity_ref: Option<&str>) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((action.to_string(), description.to_string()));
    }
}

/// Fixed-output template renderer.
#[derive(Debug, Clone)]
pub struct StaticTemplates;

impl TemplateRenderer for StaticTemplates {
    fn render(&self, category: Category, locale: &str) -> RenderedTemplate {
        RenderedTemplate {
            subject: format!("[{locale}] {category}"),
            html: format!("<p>{category}</p>"),
        }
    }
}

/// Fixed admin directory.
#[derive(Debug, Clone)]
pub struct StaticAdmins(pub Vec<Mailbox>);

impl AdminDirectory for StaticAdmins {
    fn admin_recipients(&self) -> Vec<Mailbox> {
        self.0.clone()
    }
}

/// A connection configuration the stub transport never dials.
pub fn test_config() -> SmtpConfig {
    SmtpConfig {
        host: "smtp.example.com".to_string(),
        port: 465,
        username: "mailer".to_string(),
        password: "hunter2".to_string(),
        require_tls: true,
        sender_address: "quiz@example.com".to_string(),
        sender_name: Some("Quiz Panel".to_string()),
        reply_to: None,
        ehlo_name: "panel.example.com".to_string(),
    }
}
