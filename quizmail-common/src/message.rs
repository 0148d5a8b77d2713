//! The closed set of outbound message kinds.
//!
//! The wire payloads the admin panel produces used to be loosely-typed
//! blobs with optional fields depending on the message type. Here each
//! kind is a tagged variant carrying only the fields it needs; the
//! category tag is what dedup and the UI filter on.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Category tag attached to every outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    QuizResultUser,
    AdminNotification,
    TestMessage,
    DomainReputationAlert,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuizResultUser => "quiz_result_user",
            Self::AdminNotification => "admin_notification",
            Self::TestMessage => "test_message",
            Self::DomainReputationAlert => "domain_reputation_alert",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a message is, and which business entity triggered it.
///
/// The lead/quiz ids are opaque foreign keys into the admin panel's own
/// store; the delivery subsystem only ever compares them for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    /// Quiz result sent to the lead who completed the quiz.
    UserResult { lead_id: String, quiz_id: String },
    /// Notification to the panel operators about a new lead.
    AdminNotification {
        lead_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quiz_id: Option<String>,
    },
    /// Template test-send from the editor; never deduplicated by entity.
    TestMessage,
    /// Alert that the sending domain degraded on a reputation check.
    DomainReputationAlert { domain: String },
}

impl MessageKind {
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::UserResult { .. } => Category::QuizResultUser,
            Self::AdminNotification { .. } => Category::AdminNotification,
            Self::TestMessage => Category::TestMessage,
            Self::DomainReputationAlert { .. } => Category::DomainReputationAlert,
        }
    }

    /// The correlation id used for first-send idempotency, if this kind
    /// carries one.
    ///
    /// Test sends and reputation alerts are correlation-less on purpose:
    /// a test send may be repeated at will, and a domain may legitimately
    /// alert again after recovering.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::UserResult { lead_id, .. } | Self::AdminNotification { lead_id, .. } => {
                Some(lead_id)
            }
            Self::TestMessage | Self::DomainReputationAlert { .. } => None,
        }
    }
}
