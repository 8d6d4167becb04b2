//! # RocksDB Storage Adapter
//!
//! Production [`KeyValueStore`] over RocksDB with one column family per
//! broker column, Snappy compression, and bloom filters for point reads.
//! RocksDB is internally synchronized, so the adapter holds the database
//! directly and needs no lock of its own.

use std::path::PathBuf;

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode,
    Options, WriteBatch, WriteOptions, DB,
};

use meshmq_types::{BatchOperation, Column, KeyValueStore, StorageError};

/// Every column family the broker uses.
const COLUMN_FAMILIES: &[Column] = &[Column::Queue, Column::Persist];

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
    /// Block cache size in bytes.
    pub block_cache_size: usize,
    /// Fsync every write. Queue durability depends on this.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/db"),
            write_buffer_size: 64 * 1024 * 1024,
            block_cache_size: 256 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Small buffers, no fsync. For tests only.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024,
            block_cache_size: 8 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed [`KeyValueStore`].
pub struct RocksDbStore {
    db: DB,
    sync_writes: bool,
}

impl RocksDbStore {
    /// Opens or creates the database with all broker column families.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|column| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(column.name(), cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StorageError::Backend(format!("open failed: {e}")))?;

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    fn cf(&self, column: Column) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(column.name())
            .ok_or_else(|| StorageError::Backend(format!("missing column family {}", column.name())))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(column)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StorageError::Backend(format!("get failed: {e}")))
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(column)?;
        self.db
            .put_cf_opt(cf, key, value, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("put failed: {e}")))
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(column)?;
        self.db
            .delete_cf_opt(cf, key, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("delete failed: {e}")))
    }

    fn write_batch(
        &self,
        column: Column,
        operations: Vec<BatchOperation>,
    ) -> Result<(), StorageError> {
        let cf = self.cf(column)?;
        let mut batch = WriteBatch::default();
        for operation in operations {
            match operation {
                BatchOperation::Put { key, value } => batch.put_cf(cf, key, value),
                BatchOperation::Delete { key } => batch.delete_cf(cf, key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("batch write failed: {e}")))
    }

    fn scan_prefix(
        &self,
        column: Column,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(column)?;
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) =
                item.map_err(|e| StorageError::Backend(format!("scan failed: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn delete_prefix(&self, column: Column, prefix: &[u8]) -> Result<u64, StorageError> {
        let doomed = self.scan_prefix(column, prefix)?;
        let removed = doomed.len() as u64;
        if removed > 0 {
            let operations = doomed
                .into_iter()
                .map(|(key, _)| BatchOperation::Delete { key })
                .collect();
            self.write_batch(column, operations)?;
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<(), StorageError> {
        for column in COLUMN_FAMILIES {
            let cf = self.cf(*column)?;
            self.db
                .flush_cf(cf)
                .map_err(|e| StorageError::Backend(format!("flush failed: {e}")))?;
        }
        Ok(())
    }
}
