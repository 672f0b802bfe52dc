//! Journal Implementations - Pluggable Record Persistence
//!
//! Like Akka Persistence, the storage backend is picked by configuration:
//! - InMemoryJournal: For development/testing
//! - RocksDbJournal: Durable local storage

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{Level, event};

use crate::{
    adapter::rocksdb::RocksDbJournal,
    domain::{constant::journal, error::ProcessError},
    port::journal::{Journal, JournalEntry}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum JournalType {
    #[serde(rename = "inmemory")]
    #[value(name = "inmemory")]
    #[default]
    InMemory,
    #[serde(rename = "rocksdb")]
    #[value(name = "rocksdb")]
    RocksDb
}

impl JournalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalType::InMemory => "inmemory",
            JournalType::RocksDb => "rocksdb"
        }
    }
}

/// In-Memory Journal Implementation
///
/// HashMap-based storage for development and testing.
/// Entries are stored by persistence_id.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: Arc<RwLock<HashMap<String, Vec<JournalEntry>>>>
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())) }
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, persistence_id: &str, payload: Vec<u8>) -> Result<u64, ProcessError> {
        let mut store = self.entries.write().await;
        let partition = store.entry(persistence_id.to_string()).or_default();

        let sequence_nr = partition.len() as u64 + 1;
        partition.push(JournalEntry {
            persistence_id: persistence_id.to_string(),
            sequence_nr,
            recorded_at: Utc::now(),
            payload
        });

        event!(Level::TRACE, event = journal::ENTRY_APPENDED, persistence_id = %persistence_id, sequence_nr);
        Ok(sequence_nr)
    }

    async fn replay(&self, persistence_id: &str, from_sequence_nr: u64) -> Result<Vec<JournalEntry>, ProcessError> {
        let store = self.entries.read().await;

        let entries: Vec<JournalEntry> = store
            .get(persistence_id)
            .map(|partition| partition.iter().filter(|e| e.sequence_nr >= from_sequence_nr).cloned().collect())
            .unwrap_or_default();

        event!(Level::TRACE, event = journal::ENTRIES_REPLAYED, persistence_id = %persistence_id,
               count = entries.len());
        Ok(entries)
    }

    async fn highest_sequence_nr(&self, persistence_id: &str) -> Result<u64, ProcessError> {
        let store = self.entries.read().await;

        Ok(store.get(persistence_id).map(|partition| partition.len() as u64).unwrap_or(0))
    }

    async fn persistence_ids(&self) -> Result<Vec<String>, ProcessError> {
        let store = self.entries.read().await;

        let mut ids: Vec<String> = store.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Journal Factory - Configuration-driven journal creation
pub struct JournalFactory;

impl JournalFactory {
    /// Create journal based on configuration
    pub fn create(journal_type: JournalType, database_path: Option<PathBuf>) -> Result<Arc<dyn Journal>, ProcessError> {
        match journal_type {
            JournalType::InMemory => Ok(Arc::new(InMemoryJournal::new())),
            JournalType::RocksDb => {
                let path = database_path.ok_or_else(|| {
                    ProcessError::Configuration("rocksdb journal requires a database_path".to_string())
                })?;
                Ok(Arc::new(RocksDbJournal::open(path)?))
            }
        }
    }
}
