//! # Key-Value Storage Port
//!
//! The broker's durable state lives in an ordered key-value store with two
//! columns: one for queue entries and sequence counters, one for subscription
//! records. The production adapter is RocksDB in the node crate;
//! [`MemoryStore`] here backs tests and standalone experiments.
//!
//! All methods take `&self`: implementations must be internally synchronized
//! so that writers for unrelated keys do not serialize against each other.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;

/// Storage column the broker writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Durable queue entries and per-subscriber sequence counters.
    Queue,
    /// Subscription records that survive restarts.
    Persist,
}

impl Column {
    /// Stable column name, used for column family lookup and logging.
    pub const fn name(self) -> &'static str {
        match self {
            Column::Queue => "queue",
            Column::Persist => "persist",
        }
    }
}

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The store has been closed and accepts no further operations.
    #[error("storage is closed")]
    Closed,
}

/// A single operation within an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Insert or overwrite a key.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Remove a key. Removing an absent key is not an error.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Creates a put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Ordered key-value storage with atomic batches and prefix operations.
///
/// Keys within a column are ordered bytewise ascending. `scan_prefix`
/// returns the entries present when the scan starts; writes that race with
/// the scan may or may not be observed, which every caller tolerates.
pub trait KeyValueStore: Send + Sync {
    /// Reads a single key. Absent keys yield `Ok(None)`.
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Inserts or overwrites a single key.
    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Removes a single key. Removing an absent key succeeds.
    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError>;

    /// Applies all operations as one atomic unit: either every operation
    /// becomes visible or none does.
    fn write_batch(&self, column: Column, operations: Vec<BatchOperation>)
        -> Result<(), StorageError>;

    /// Returns all entries whose key starts with `prefix`, in ascending key
    /// order.
    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Removes every key starting with `prefix` and returns how many were
    /// removed.
    fn delete_prefix(&self, column: Column, prefix: &[u8]) -> Result<u64, StorageError>;

    /// Forces buffered writes to stable storage.
    fn flush(&self) -> Result<(), StorageError>;
}

/// In-memory [`KeyValueStore`] over ordered maps.
///
/// Shared across broker instances in tests to model restart-with-state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    queue: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    persist: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held in a column. Test helper.
    pub fn entry_count(&self, column: Column) -> usize {
        self.tree(column).read().len()
    }

    fn tree(&self, column: Column) -> &RwLock<BTreeMap<Vec<u8>, Vec<u8>>> {
        match column {
            Column::Queue => &self.queue,
            Column::Persist => &self.persist,
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tree(column).read().get(key).cloned())
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.tree(column).write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        self.tree(column).write().remove(key);
        Ok(())
    }

    fn write_batch(
        &self,
        column: Column,
        operations: Vec<BatchOperation>,
    ) -> Result<(), StorageError> {
        let mut tree = self.tree(column).write();
        for operation in operations {
            match operation {
                BatchOperation::Put { key, value } => {
                    tree.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    tree.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let tree = self.tree(column).read();
        Ok(tree
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn delete_prefix(&self, column: Column, prefix: &[u8]) -> Result<u64, StorageError> {
        let mut tree = self.tree(column).write();
        let doomed: Vec<Vec<u8>> = tree
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            tree.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
