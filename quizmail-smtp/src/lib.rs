//! Minimal SMTP submission client.
//!
//! Implements exactly the subset of the protocol an authenticated
//! submission needs — greeting, `EHLO`, `AUTH LOGIN`, `MAIL FROM`,
//! `RCPT TO`, `DATA`, `QUIT` — over a plain or TLS-wrapped socket.
//! Going to the raw socket instead of a full mail library keeps every
//! protocol step auditable; the price is that reply parsing (multi-line
//! replies, code extraction) lives here, in [`reply`].
//!
//! Timeouts are deliberately *not* applied at this layer; the delivery
//! crate wraps each step in its own budget so a hung read surfaces as a
//! retryable transport failure there.

pub mod client;
pub mod error;
pub mod mime;
pub mod reply;

pub use client::SubmissionClient;
pub use error::{ClientError, Result};
pub use reply::{Reply, ReplyReader};
