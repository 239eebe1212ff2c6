//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `events` - Append-only event log (key: offset, big-endian)
//! - `tx_index` - Transaction reference to offset
//! - `correlation` - Correlation id index (key: correlation_id || 0x00 || offset)
//! - `meta` - Chain head (offset and transaction reference of the last event)

use crate::{
    error::{Error, Result},
    types::{LedgerEvent, TxRef},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use std::sync::Arc;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_TX_INDEX: &str = "tx_index";
const CF_CORRELATION: &str = "correlation";
const CF_META: &str = "meta";

/// Meta key holding the chain head
const HEAD_KEY: &[u8] = b"head";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_TX_INDEX, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_CORRELATION, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened ledger RocksDB");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Event operations

    /// Append a batch of sealed events and advance the head (atomic)
    ///
    /// Events must be contiguous and continue the current head.
    pub fn append_batch(&self, events: &[LedgerEvent]) -> Result<()> {
        let Some(last) = events.last() else {
            return Ok(());
        };

        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_tx = self.cf_handle(CF_TX_INDEX)?;
        let cf_corr = self.cf_handle(CF_CORRELATION)?;
        let cf_meta = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();

        for event in events {
            let offset_key = event.offset.to_be_bytes();
            batch.put_cf(cf_events, offset_key, bincode::serialize(event)?);
            batch.put_cf(cf_tx, event.tx_ref.as_bytes(), offset_key);
            batch.put_cf(
                cf_corr,
                Self::correlation_key(&event.correlation_id, Some(event.offset)),
                b"",
            );
        }

        batch.put_cf(cf_meta, HEAD_KEY, Self::encode_head(last.offset, &last.tx_ref));

        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            first_offset = events[0].offset,
            last_offset = last.offset,
            "Events appended"
        );

        Ok(())
    }

    /// Get event by offset
    pub fn get_event(&self, offset: u64) -> Result<LedgerEvent> {
        let cf = self.cf_handle(CF_EVENTS)?;

        let value = self
            .db
            .get_cf(cf, offset.to_be_bytes())?
            .ok_or_else(|| Error::EventNotFound(format!("offset {}", offset)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Get event by transaction reference
    pub fn get_event_by_tx_ref(&self, tx_ref: &TxRef) -> Result<LedgerEvent> {
        let cf = self.cf_handle(CF_TX_INDEX)?;

        let value = self
            .db
            .get_cf(cf, tx_ref.as_bytes())?
            .ok_or_else(|| Error::EventNotFound(tx_ref.to_string()))?;

        self.get_event(Self::decode_offset(&value)?)
    }

    /// Events with offsets in `from..=to`, ascending
    pub fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = from.to_be_bytes();

        let mut events = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, value) = item?;
            if Self::decode_offset(&key)? > to {
                break;
            }
            events.push(bincode::deserialize(&value)?);
        }

        Ok(events)
    }

    /// All events for a correlation id, in ledger order
    pub fn correlation_events(&self, correlation_id: &str) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_CORRELATION)?;
        let prefix = Self::correlation_key(correlation_id, None);

        let mut offsets = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            offsets.push(Self::decode_offset(&key[prefix.len()..])?);
        }

        offsets.into_iter().map(|offset| self.get_event(offset)).collect()
    }

    /// Offset and transaction reference of the last durable event
    pub fn head(&self) -> Result<Option<(u64, TxRef)>> {
        let cf = self.cf_handle(CF_META)?;

        match self.db.get_cf(cf, HEAD_KEY)? {
            Some(value) => Ok(Some(Self::decode_head(&value)?)),
            None => Ok(None),
        }
    }

    // Key helpers

    fn correlation_key(correlation_id: &str, offset: Option<u64>) -> Vec<u8> {
        let mut key = correlation_id.as_bytes().to_vec();
        key.push(0); // Separator; correlation ids never contain NUL
        if let Some(offset) = offset {
            key.extend_from_slice(&offset.to_be_bytes());
        }
        key
    }

    fn decode_offset(bytes: &[u8]) -> Result<u64> {
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::Storage(format!("Corrupt offset key ({} bytes)", bytes.len())))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn encode_head(offset: u64, tx_ref: &TxRef) -> Vec<u8> {
        let mut value = offset.to_be_bytes().to_vec();
        value.extend_from_slice(tx_ref.as_bytes());
        value
    }

    fn decode_head(value: &[u8]) -> Result<(u64, TxRef)> {
        if value.len() != 40 {
            return Err(Error::Storage(format!("Corrupt head ({} bytes)", value.len())));
        }
        let offset = Self::decode_offset(&value[..8])?;
        let mut tx = [0u8; 32];
        tx.copy_from_slice(&value[8..]);
        Ok((offset, TxRef::from_bytes(tx)))
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_events = self.cf_handle(CF_EVENTS)?;

        let approximate_events = self
            .db
            .property_int_value_cf(cf_events, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(StorageStats {
            approximate_events,
            head_offset: self.head()?.map(|(offset, _)| offset),
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// RocksDB key estimate for the event log
    pub approximate_events: u64,
    /// Offset of the last durable event
    pub head_offset: Option<u64>,
}
