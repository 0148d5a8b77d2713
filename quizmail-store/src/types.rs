//! Identifier newtypes.
//!
//! Queue items and delivery logs use ULIDs: globally unique,
//! collision-resistant, and lexicographically sortable by creation time,
//! which gives oldest-first queue ordering for free.

use std::fmt;

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a fresh unique id.
            #[must_use]
            pub fn generate() -> Self {
                Self(ulid::Ulid::new())
            }

            /// Wrap an existing ULID.
            #[must_use]
            pub const fn new(id: ulid::Ulid) -> Self {
                Self(id)
            }

            /// Parse from the canonical 26-character string form.
            #[must_use]
            pub fn parse(input: &str) -> Option<Self> {
                ulid::Ulid::from_string(input).ok().map(Self)
            }

            /// Milliseconds since the Unix epoch encoded in the id.
            #[must_use]
            pub const fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                ulid::Ulid::from_string(&s)
                    .map(Self)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

ulid_id! {
    /// Identifier of a message waiting in the queue.
    MessageId
}

ulid_id! {
    /// Identifier of a delivery log row.
    LogId
}
