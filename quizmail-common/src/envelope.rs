//! Message envelope model: who a message is from, to, and replied to.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed or unparseable email address.
#[derive(Debug, Error)]
#[error("invalid address `{address}`: {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

/// A single mailbox: an address plus an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// The bare email address (`local@domain`).
    pub address: String,
    /// Display name shown alongside the address, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    /// Validate the bare address: structural checks first, then the
    /// same parser used for inbound mail headers.
    ///
    /// # Errors
    /// Returns [`AddressError`] if the address does not parse as a single
    /// mailbox.
    pub fn validated(self) -> Result<Self, AddressError> {
        let well_formed = self
            .address
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            })
            && !self
                .address
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ',' | '<' | '>'));

        if !well_formed {
            return Err(AddressError {
                address: self.address,
                reason: "not a bare local@domain address".to_string(),
            });
        }

        let parsed = mailparse::addrparse(&self.address).map_err(|e| AddressError {
            address: self.address.clone(),
            reason: e.to_string(),
        })?;

        match parsed.iter().next() {
            Some(mailparse::MailAddr::Single(_)) if parsed.len() == 1 => Ok(self),
            _ => Err(AddressError {
                address: self.address,
                reason: "expected exactly one mailbox".to_string(),
            }),
        }
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// The envelope of one outbound message.
///
/// quizmail always submits to exactly one recipient per message; fan-out
/// (e.g. alerting several admins) is modelled as several queue items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub recipient: Mailbox,
    pub sender: Mailbox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Mailbox>,
}

impl Envelope {
    #[must_use]
    pub const fn new(recipient: Mailbox, sender: Mailbox) -> Self {
        Self {
            recipient,
            sender,
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: Mailbox) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Validate both endpoint addresses.
    ///
    /// # Errors
    /// Returns the first [`AddressError`] encountered.
    pub fn validated(self) -> Result<Self, AddressError> {
        Ok(Self {
            recipient: self.recipient.validated()?,
            sender: self.sender.validated()?,
            reply_to: self.reply_to.map(Mailbox::validated).transpose()?,
        })
    }
}
