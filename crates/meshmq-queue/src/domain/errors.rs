//! Queue engine errors.

use meshmq_types::{RecordError, StorageError};
use thiserror::Error;

/// Failures surfaced by the queue engine.
///
/// A missing entry is not an error anywhere in this crate: acknowledging an
/// already-removed entry reports `false`, draining an empty queue yields an
/// empty iterator.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The manager was shut down; writes fail fast.
    #[error("queue manager is closed")]
    Closed,

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A record could not be encoded.
    #[error(transparent)]
    Record(#[from] RecordError),
}
