//! Queue domain entities.

use meshmq_types::Message;
use serde::{Deserialize, Serialize};

/// One durable message waiting for a subscriber.
///
/// The sequence number is assigned at enqueue time and doubles as the
/// acknowledgement handle: a subscriber acks `(subscriber, seq)` once it has
/// processed the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Position in the subscriber's queue, strictly increasing.
    pub seq: u64,
    /// The message as it was published.
    pub message: Message,
}
