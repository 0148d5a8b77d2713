//! Outbound delivery orchestration.
//!
//! This crate owns everything between a producer's "send this" and the
//! admin panel's delivery timeline:
//! - deciding whether a candidate message is a duplicate ([`dedup`])
//! - the durable queue's processing loop with retry/backoff ([`manager`])
//! - driving one SMTP submission per message ([`smtp_transaction`],
//!   behind the [`Transport`] seam so tests stub the wire)
//! - reconciling asynchronous provider events onto delivery logs
//!   ([`tracker`])
//! - the domain-reputation alert producer with its hysteresis rule
//!   ([`notify`])
//!
//! Scheduling is not owned here: an external cron-like trigger calls
//! [`QueueManager::process_batch`] and [`QueueManager::reclaim_stale`].

pub mod dedup;
pub mod error;
pub mod manager;
pub mod notify;
pub mod retry;
pub mod service;
pub mod smtp_transaction;
pub mod tracker;
pub mod transport;
pub mod types;

pub use dedup::{DedupGuard, Verdict};
pub use error::{DeliveryError, PermanentError, TemporaryError};
pub use manager::QueueManager;
pub use notify::{NotifyOutcome, ReputationNotifier, ReputationStatus};
pub use retry::RetryPolicy;
pub use service::DeliveryQuery;
pub use smtp_transaction::SmtpTransaction;
pub use tracker::{Applied, DeliveryTracker, TrackerError};
pub use transport::{SmtpTransport, Transport};
pub use types::{BatchReport, EnqueueOutcome, NewMessage, SmtpTimeouts};
