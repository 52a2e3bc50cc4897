//! Domain factories for creating identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    error::ValueObjectError,
    value_object::{ConnectionId, MessageId, NotificationId, Timestamp},
};

/// Factory for generating ConnectionId instances.
///
/// Stands in for the transport-assigned socket id.
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// Generate a new ConnectionId from a random UUID v4 (simple form, 32 hex chars).
    pub fn generate() -> Result<ConnectionId, ValueObjectError> {
        ConnectionId::new(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Factory for generating NotificationId instances.
pub struct NotificationIdFactory;

impl NotificationIdFactory {
    pub fn generate() -> NotificationId {
        NotificationId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Generates message ids ordered by generation time.
///
/// Ids are millisecond timestamps bumped by one whenever two messages are
/// generated within the same millisecond (or the clock steps backwards), so
/// they are unique and strictly increasing for one factory.
#[derive(Debug, Default)]
pub struct MessageIdFactory {
    last: AtomicU64,
}

impl MessageIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, now: Timestamp) -> MessageId {
        let candidate = u64::try_from(now.value()).unwrap_or(0);
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return MessageId::new(next),
                Err(actual) => last = actual,
            }
        }
    }
}
