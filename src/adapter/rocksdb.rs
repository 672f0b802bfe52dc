//! RocksDB journal - durable, append-only process records

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, DB, Direction, IteratorMode, Options, WriteBatch};
use tokio::sync::Mutex;
use tracing::{Level, event};

use crate::{
    domain::{constant::journal, error::ProcessError},
    port::journal::{Journal, JournalEntry}
};

/// Column family names
const CF_JOURNAL: &str = "journal";
const CF_META: &str = "meta";

const SEQ_PREFIX: &str = "seq:";

/// RocksDB implementation of the journal
///
/// Entries live in `journal` keyed by the big-endian length of the persistence
/// id, the id itself and the big-endian sequence number. The length prefix
/// keeps one id's entries contiguous even when another id starts with it, and
/// a forward iteration yields append order. `meta` keeps the highest sequence
/// number per persistence id.
pub struct RocksDbJournal {
    db:          Arc<DB>,
    /// Serializes the read-highest/write-batch pair of an append
    write_guard: Mutex<()>
}

impl RocksDbJournal {
    /// Open (or create) a journal at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ProcessError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Optimize for append-heavy workloads
        opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB
        opts.set_max_write_buffer_number(3);
        opts.set_max_background_jobs(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open_cf(&opts, path.as_ref(), [CF_JOURNAL, CF_META])
            .map_err(|e| ProcessError::Configuration(format!("Failed to open RocksDB journal: {}", e)))?;

        event!(Level::DEBUG, event = journal::JOURNAL_OPENED, path = %path.as_ref().display());

        Ok(Self { db: Arc::new(db), write_guard: Mutex::new(()) })
    }

    /// Get column family handle
    fn get_cf(&self, name: &str) -> Result<&ColumnFamily, ProcessError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ProcessError::Configuration(format!("Column family '{}' not found", name)))
    }

    fn partition_prefix(persistence_id: &str) -> Vec<u8> {
        let id = persistence_id.as_bytes();
        let mut prefix = Vec::with_capacity(4 + id.len() + 8);
        prefix.extend_from_slice(&(id.len() as u32).to_be_bytes());
        prefix.extend_from_slice(id);
        prefix
    }

    fn entry_key(persistence_id: &str, sequence_nr: u64) -> Vec<u8> {
        let mut key = Self::partition_prefix(persistence_id);
        key.extend_from_slice(&sequence_nr.to_be_bytes());
        key
    }

    fn seq_key(persistence_id: &str) -> String {
        format!("{}{}", SEQ_PREFIX, persistence_id)
    }

    fn read_highest(&self, persistence_id: &str) -> Result<u64, ProcessError> {
        let cf_meta = self.get_cf(CF_META)?;

        match self.db.get_cf(cf_meta, Self::seq_key(persistence_id))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    ProcessError::JournalRead(format!("Corrupt sequence counter for '{}'", persistence_id))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0)
        }
    }
}

#[async_trait]
impl Journal for RocksDbJournal {
    async fn append(&self, persistence_id: &str, payload: Vec<u8>) -> Result<u64, ProcessError> {
        let _guard = self.write_guard.lock().await;

        let cf_journal = self.get_cf(CF_JOURNAL)?;
        let cf_meta = self.get_cf(CF_META)?;

        let sequence_nr = self.read_highest(persistence_id)? + 1;
        let entry = JournalEntry {
            persistence_id: persistence_id.to_string(),
            sequence_nr,
            recorded_at: Utc::now(),
            payload
        };
        let data = serde_json::to_vec(&entry).map_err(|e| ProcessError::Serialization(e.to_string()))?;

        // Entry and counter are written atomically
        let mut batch = WriteBatch::default();
        batch.put_cf(cf_journal, Self::entry_key(persistence_id, sequence_nr), &data);
        batch.put_cf(cf_meta, Self::seq_key(persistence_id), sequence_nr.to_be_bytes());

        self.db.write(batch).map_err(|e| {
            event!(Level::ERROR, event = journal::STORAGE_FAILED, persistence_id = %persistence_id, error = %e);
            ProcessError::JournalWrite(format!("Failed to append to '{}': {}", persistence_id, e))
        })?;

        event!(Level::TRACE, event = journal::ENTRY_APPENDED, persistence_id = %persistence_id, sequence_nr);
        Ok(sequence_nr)
    }

    async fn replay(&self, persistence_id: &str, from_sequence_nr: u64) -> Result<Vec<JournalEntry>, ProcessError> {
        let cf_journal = self.get_cf(CF_JOURNAL)?;

        let prefix = Self::partition_prefix(persistence_id);
        let start = Self::entry_key(persistence_id, from_sequence_nr.max(1));
        let iter = self.db.iterator_cf(cf_journal, IteratorMode::From(&start, Direction::Forward));

        let mut entries = Vec::new();

        for item in iter {
            let (key, value) = item.map_err(|e| ProcessError::JournalRead(format!("Failed to read entry: {}", e)))?;

            if key.len() != prefix.len() + 8 || !key.starts_with(&prefix) {
                break;
            }

            let entry: JournalEntry = serde_json::from_slice(&value)
                .map_err(|e| ProcessError::Serialization(format!("Failed to deserialize entry: {}", e)))?;

            entries.push(entry);
        }

        event!(Level::TRACE, event = journal::ENTRIES_REPLAYED, persistence_id = %persistence_id,
               count = entries.len());
        Ok(entries)
    }

    async fn highest_sequence_nr(&self, persistence_id: &str) -> Result<u64, ProcessError> {
        self.read_highest(persistence_id)
    }

    async fn persistence_ids(&self) -> Result<Vec<String>, ProcessError> {
        let cf_meta = self.get_cf(CF_META)?;

        let mut ids = Vec::new();
        for item in self.db.iterator_cf(cf_meta, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| ProcessError::JournalRead(format!("Failed to read index: {}", e)))?;

            let key_str = String::from_utf8_lossy(&key);
            if let Some(id) = key_str.strip_prefix(SEQ_PREFIX) {
                ids.push(id.to_string());
            }
        }

        Ok(ids)
    }
}
