//! Storage key layout for the persist column.

use meshmq_types::{EntityId, Pattern};

/// Prefix for durable subscription records.
pub(crate) const SUBSCRIPTION_PREFIX: &[u8] = b"sub:";

/// Key of one subscription record: `sub: || subscriber || pattern`.
///
/// The subscriber comes first so all of one subscriber's records are
/// adjacent; the pattern makes the key unique per subscription.
pub(crate) fn subscription_key(subscriber: &EntityId, pattern: &Pattern) -> Vec<u8> {
    let mut key =
        Vec::with_capacity(SUBSCRIPTION_PREFIX.len() + 32 + pattern.as_str().len());
    key.extend_from_slice(SUBSCRIPTION_PREFIX);
    key.extend_from_slice(subscriber.as_bytes());
    key.extend_from_slice(pattern.as_str().as_bytes());
    key
}
