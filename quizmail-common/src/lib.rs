//! Shared leaf types for the quizmail outbound delivery subsystem.
//!
//! Everything here is consumed by the store, transport, and delivery
//! crates: the envelope/mailbox model, the closed set of outbound message
//! kinds, SMTP connection configuration, and the collaborator traits
//! (template rendering, audit sink, admin directory) that the rest of the
//! product implements.

pub mod audit;
pub mod config;
pub mod envelope;
pub mod logging;
pub mod message;
pub mod traits;

pub use audit::{AuditSink, TracingAuditSink};
pub use config::SmtpConfig;
pub use envelope::{AddressError, Envelope, Mailbox};
pub use message::{Category, MessageKind};
pub use traits::{AdminDirectory, RenderedTemplate, TemplateRenderer};
