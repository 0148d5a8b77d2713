//! Error types for the SMTP client.

use std::io;

use thiserror::Error;

/// Errors that can occur while talking to the submission server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO error during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server sent something that does not parse as an SMTP reply.
    #[error("failed to parse SMTP reply: {0}")]
    Parse(String),

    /// The server answered a command with an unexpected reply code.
    ///
    /// Carries the offending command so failures are diagnosable from
    /// the delivery log alone.
    #[error("{command} failed: {code} {message}")]
    UnexpectedReply {
        command: &'static str,
        code: u16,
        message: String,
    },

    /// TLS setup failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection was closed before the dialogue finished.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Reply bytes were not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
