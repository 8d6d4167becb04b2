//! Storage key layout for the queue column.
//!
//! Entry keys embed the sequence number big-endian so byte order equals
//! numeric order and prefix scans walk a backlog oldest-first.

use meshmq_types::EntityId;

/// Prefix for queue entry keys.
pub(crate) const ENTRY_PREFIX: &[u8] = b"ent:";

/// Prefix for per-subscriber sequence counter keys.
pub(crate) const COUNTER_PREFIX: &[u8] = b"ctr:";

const ID_LEN: usize = 32;
const SEQ_LEN: usize = 8;

/// Key of one queue entry: `ent: || subscriber || seq`.
pub(crate) fn entry_key(subscriber: &EntityId, seq: u64) -> Vec<u8> {
    let mut key = entry_prefix(subscriber);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Prefix covering every entry of one subscriber.
pub(crate) fn entry_prefix(subscriber: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ENTRY_PREFIX.len() + ID_LEN + SEQ_LEN);
    key.extend_from_slice(ENTRY_PREFIX);
    key.extend_from_slice(subscriber.as_bytes());
    key
}

/// Key of a subscriber's sequence counter: `ctr: || subscriber`.
pub(crate) fn counter_key(subscriber: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(COUNTER_PREFIX.len() + ID_LEN);
    key.extend_from_slice(COUNTER_PREFIX);
    key.extend_from_slice(subscriber.as_bytes());
    key
}

/// Splits an entry key back into subscriber and sequence number.
pub(crate) fn split_entry_key(key: &[u8]) -> Option<(EntityId, u64)> {
    let rest = key.strip_prefix(ENTRY_PREFIX)?;
    if rest.len() != ID_LEN + SEQ_LEN {
        return None;
    }
    let (id_bytes, seq_bytes) = rest.split_at(ID_LEN);
    let id: [u8; 32] = id_bytes.try_into().ok()?;
    let seq: [u8; 8] = seq_bytes.try_into().ok()?;
    Some((EntityId::new(id), u64::from_be_bytes(seq)))
}

/// Splits a counter key back into the subscriber identity.
pub(crate) fn split_counter_key(key: &[u8]) -> Option<EntityId> {
    let rest = key.strip_prefix(COUNTER_PREFIX)?;
    let id: [u8; 32] = rest.try_into().ok()?;
    Some(EntityId::new(id))
}
