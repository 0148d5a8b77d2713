//! Fire-and-forget audit sink.
//!
//! Every delivery attempt and tracker event is recorded to an activity
//! log the admin panel renders. Failures to write audit records must
//! never fail the operation being audited, so the sink is infallible by
//! contract; implementations swallow and log their own errors.

use std::fmt;

/// Activity-log collaborator.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Record one activity entry.
    ///
    /// `action` is a stable machine tag (e.g. `email_sent`), `description`
    /// a human line for the activity feed, `entity_ref` an opaque
    /// reference to the related business row if any.
    fn record(&self, action: &str, description: &str, entity_ref: Option<&str>);
}

/// Default sink: structured tracing events, picked up by whatever
/// subscriber the host process installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, action: &str, description: &str, entity_ref: Option<&str>) {
        tracing::event!(
            tracing::Level::INFO,
            action = %action,
            entity = entity_ref.unwrap_or("-"),
            "Audit: {description}"
        );
    }
}
