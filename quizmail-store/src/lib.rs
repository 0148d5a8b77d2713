//! Durable state for the outbound delivery subsystem.
//!
//! Two collections back everything: the queue of messages not yet
//! delivered ([`QueueItem`]) and the permanent audit record of every
//! attempted send ([`DeliveryLog`]). All mutation goes through the
//! [`QueueStore`] / [`LogStore`] repository traits so the queue manager
//! and status tracker never touch a concrete backend, and so the
//! insert-if-absent dedup operation can be a single transactional method
//! instead of a read-then-write race.

pub mod backends;
pub mod error;
pub mod item;
pub mod log;
pub mod r#trait;
pub mod types;

pub use backends::MemoryStore;
pub use error::{Result, StoreError};
pub use item::{QueueItem, QueueState};
pub use log::{
    BounceKind, DeliveryEvent, DeliveryEventKind, DeliveryLog, DeliveryState, EventDetail,
    SendOutcome,
};
pub use r#trait::{LogStore, QueueStore};
pub use types::{LogId, MessageId};
