//! # Queue Manager
//!
//! Owns every durable subscriber queue. Sequence assignment and the entry
//! write happen in one atomic batch per enqueue; per-subscriber counters are
//! independent locks so traffic for one subscriber never stalls another.
//!
//! ## Concurrency
//!
//! - `counters` maps subscriber to an `Arc<Mutex<SequenceCounter>>`. The
//!   outer map lock is held only to fetch or create the cell; the cell lock
//!   is held across the batch commit so the persisted counter can never run
//!   behind a committed entry.
//! - `write_gate` is a read-write lock taken in read mode by every write
//!   path. `close` flips the closed flag and then takes it in write mode,
//!   which drains all in-flight writes before the final flush.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use meshmq_types::{
    decode_record, encode_record, BatchOperation, Column, EntityId, KeyValueStore, Message,
};

use crate::domain::entities::QueueEntry;
use crate::domain::errors::QueueError;
use crate::domain::keys;

/// Sequence numbers start at 1; 0 is never assigned.
const FIRST_SEQ: u64 = 1;

#[derive(Debug, Default)]
struct SequenceCounter {
    /// Next sequence to assign, `None` until loaded from storage.
    next: Option<u64>,
}

/// Result of a queue-wide retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionReport {
    /// Queues examined.
    pub subscribers: usize,
    /// Entries removed across all queues.
    pub evicted: u64,
}

/// Durable per-subscriber FIFO queues over ordered key-value storage.
pub struct QueueManager {
    store: Arc<dyn KeyValueStore>,
    counters: Mutex<HashMap<EntityId, Arc<Mutex<SequenceCounter>>>>,
    write_gate: RwLock<()>,
    closed: AtomicBool,
}

impl QueueManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            counters: Mutex::new(HashMap::new()),
            write_gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends a message to a subscriber's durable queue and returns the
    /// assigned sequence number.
    ///
    /// The entry and the updated counter are committed as one atomic batch:
    /// after a crash either both are present or neither is.
    pub fn enqueue(&self, subscriber: &EntityId, message: &Message) -> Result<u64, QueueError> {
        let _inflight = self.write_gate.read();
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let cell = self.counter_cell(subscriber);
        let mut counter = cell.lock();
        let seq = match counter.next {
            Some(next) => next,
            None => {
                let loaded = self.load_next_seq(subscriber)?;
                counter.next = Some(loaded);
                loaded
            }
        };

        let entry = QueueEntry {
            seq,
            message: message.clone(),
        };
        let encoded = encode_record(&entry)?;
        self.store.write_batch(
            Column::Queue,
            vec![
                BatchOperation::put(keys::entry_key(subscriber, seq), encoded),
                BatchOperation::put(keys::counter_key(subscriber), seq.to_be_bytes().to_vec()),
            ],
        )?;
        counter.next = Some(seq + 1);

        tracing::debug!(
            subscriber = %subscriber,
            seq,
            topic = %message.topic,
            "enqueued durable message"
        );
        Ok(seq)
    }

    /// Opens the subscriber's backlog in ascending sequence order.
    ///
    /// Draining does not remove entries; the consumer acknowledges each one
    /// after processing. The iterator covers the entries present when the
    /// call was made and skips any that fail checksum or decode.
    pub fn drain(&self, subscriber: &EntityId) -> Result<DrainedBacklog, QueueError> {
        let raw = self
            .store
            .scan_prefix(Column::Queue, &keys::entry_prefix(subscriber))?;
        Ok(DrainedBacklog {
            subscriber: *subscriber,
            raw: raw.into_iter(),
        })
    }

    /// Removes one delivered entry. Returns `false` when the entry was
    /// already gone, which makes retried acknowledgements harmless.
    pub fn ack(&self, subscriber: &EntityId, seq: u64) -> Result<bool, QueueError> {
        let _inflight = self.write_gate.read();
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let key = keys::entry_key(subscriber, seq);
        if self.store.get(Column::Queue, &key)?.is_none() {
            return Ok(false);
        }
        self.store.delete(Column::Queue, &key)?;
        tracing::debug!(subscriber = %subscriber, seq, "acknowledged queue entry");
        Ok(true)
    }

    /// Removes entries published before `older_than_millis`, plus any entry
    /// that no longer decodes. Returns how many were removed.
    pub fn evict_expired(
        &self,
        subscriber: &EntityId,
        older_than_millis: u64,
    ) -> Result<u64, QueueError> {
        let _inflight = self.write_gate.read();
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let entries = self
            .store
            .scan_prefix(Column::Queue, &keys::entry_prefix(subscriber))?;
        let mut doomed = Vec::new();
        for (key, value) in entries {
            match decode_record::<QueueEntry>(&value) {
                Ok(entry) => {
                    if entry.message.published_at < older_than_millis {
                        doomed.push(key);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        subscriber = %subscriber,
                        error = %err,
                        "removing undecodable queue entry"
                    );
                    doomed.push(key);
                }
            }
        }
        if doomed.is_empty() {
            return Ok(0);
        }

        let count = doomed.len() as u64;
        self.store.write_batch(
            Column::Queue,
            doomed.into_iter().map(BatchOperation::delete).collect(),
        )?;
        tracing::debug!(subscriber = %subscriber, count, "evicted expired queue entries");
        Ok(count)
    }

    /// Runs [`Self::evict_expired`] for every subscriber that has ever held
    /// a queue. A failure on one queue is logged and does not stop the sweep.
    pub fn sweep_retention(&self, older_than_millis: u64) -> Result<RetentionReport, QueueError> {
        let counters = self
            .store
            .scan_prefix(Column::Queue, keys::COUNTER_PREFIX)?;

        let mut report = RetentionReport::default();
        for (key, _) in counters {
            let Some(subscriber) = keys::split_counter_key(&key) else {
                tracing::warn!(?key, "skipping malformed counter key during retention sweep");
                continue;
            };
            report.subscribers += 1;
            match self.evict_expired(&subscriber, older_than_millis) {
                Ok(evicted) => report.evicted += evicted,
                Err(QueueError::Closed) => return Err(QueueError::Closed),
                Err(err) => {
                    tracing::error!(
                        subscriber = %subscriber,
                        error = %err,
                        "retention eviction failed for subscriber"
                    );
                }
            }
        }
        Ok(report)
    }

    /// Drops a subscriber's entire backlog. The sequence counter is kept so
    /// numbers are never reused even after a purge.
    pub fn purge(&self, subscriber: &EntityId) -> Result<u64, QueueError> {
        let _inflight = self.write_gate.read();
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let removed = self
            .store
            .delete_prefix(Column::Queue, &keys::entry_prefix(subscriber))?;
        if removed > 0 {
            tracing::info!(subscriber = %subscriber, removed, "purged subscriber backlog");
        }
        Ok(removed)
    }

    /// Shuts the manager down: waits for in-flight writes, flushes storage,
    /// and makes every further write fail fast with [`QueueError::Closed`].
    /// Safe to call more than once.
    pub fn close(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _all_writes_drained = self.write_gate.write();
        self.store.flush()?;
        tracing::info!("queue manager closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn counter_cell(&self, subscriber: &EntityId) -> Arc<Mutex<SequenceCounter>> {
        let mut counters = self.counters.lock();
        Arc::clone(counters.entry(*subscriber).or_default())
    }

    /// Next sequence for a subscriber seen for the first time since startup.
    /// Prefers the persisted counter; a missing or malformed counter falls
    /// back to the highest entry present.
    fn load_next_seq(&self, subscriber: &EntityId) -> Result<u64, QueueError> {
        if let Some(raw) = self.store.get(Column::Queue, &keys::counter_key(subscriber))? {
            match <[u8; 8]>::try_from(raw.as_slice()) {
                Ok(bytes) => return Ok(u64::from_be_bytes(bytes) + 1),
                Err(_) => {
                    tracing::warn!(
                        subscriber = %subscriber,
                        "sequence counter malformed, rebuilding from entries"
                    );
                }
            }
        }
        let entries = self
            .store
            .scan_prefix(Column::Queue, &keys::entry_prefix(subscriber))?;
        let highest = entries
            .iter()
            .rev()
            .find_map(|(key, _)| keys::split_entry_key(key).map(|(_, seq)| seq));
        Ok(highest.map_or(FIRST_SEQ, |seq| seq + 1))
    }
}

/// Iterator over a subscriber's backlog, oldest first.
///
/// Decodes lazily; undecodable entries are logged and skipped so one corrupt
/// record cannot block the rest of the backlog.
pub struct DrainedBacklog {
    subscriber: EntityId,
    raw: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
}

impl DrainedBacklog {
    pub fn subscriber(&self) -> &EntityId {
        &self.subscriber
    }
}

impl Iterator for DrainedBacklog {
    type Item = QueueEntry;

    fn next(&mut self) -> Option<Self::Item> {
        for (key, value) in self.raw.by_ref() {
            match decode_record::<QueueEntry>(&value) {
                Ok(entry) => return Some(entry),
                Err(err) => {
                    let seq = keys::split_entry_key(&key).map(|(_, seq)| seq);
                    tracing::warn!(
                        subscriber = %self.subscriber,
                        seq,
                        error = %err,
                        "skipping undecodable queue entry"
                    );
                }
            }
        }
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================
