use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ProcessError;

/// One appended record of a persistence id's partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub persistence_id: String,
    /// 1-based, gapless per persistence id
    pub sequence_nr:    u64,
    pub recorded_at:    DateTime<Utc>,
    pub payload:        Vec<u8>
}

/// Append-only journal - like Akka Persistence Journal
///
/// The persistence_id is the stable process name (process type + logical key),
/// never the actor's runtime identity.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Durably append one record; returns its sequence number once confirmed
    async fn append(&self, persistence_id: &str, payload: Vec<u8>) -> Result<u64, ProcessError>;

    /// Replay records with `sequence_nr >= from_sequence_nr`, in append order
    async fn replay(&self, persistence_id: &str, from_sequence_nr: u64) -> Result<Vec<JournalEntry>, ProcessError>;

    /// Highest sequence number for a persistence id (0 when empty)
    async fn highest_sequence_nr(&self, persistence_id: &str) -> Result<u64, ProcessError>;

    /// All persistence ids with at least one record
    async fn persistence_ids(&self) -> Result<Vec<String>, ProcessError>;
}
