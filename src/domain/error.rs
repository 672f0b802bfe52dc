use thiserror::Error;

/// Errors raised by the process runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The journal refused an append; fatal to the process instance
    #[error("journal write failed: {0}")]
    JournalWrite(String),

    /// Reading the journal failed
    #[error("journal read failed: {0}")]
    JournalRead(String),

    /// Replaying the journal could not rebuild the process
    #[error("recovery failed: {0}")]
    Recovery(String),

    /// Record or rejection payload could not be encoded/decoded
    #[error("{0}")]
    Serialization(String),

    /// A command could not be handed to its destination
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Spawn errors
    #[error("{0}")]
    Spawn(String),

    /// Actor messaging errors
    #[error("{0}")]
    Messaging(String),

    /// Configuration related errors
    #[error("{0}")]
    Configuration(String),

    /// Timeout errors
    #[error("{0}")]
    Timeout(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String)
}

impl ProcessError {
    /// Whether the error must stop the process instance that observed it
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessError::JournalWrite(_) | ProcessError::JournalRead(_) | ProcessError::Recovery(_))
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for ProcessError {
    fn from(err: anyhow::Error) -> Self {
        ProcessError::Generic(err.to_string())
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ProcessError {
    fn from(err: std::io::Error) -> Self {
        ProcessError::Configuration(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for ProcessError {
    fn from(err: serde_json::Error) -> Self {
        ProcessError::Serialization(err.to_string())
    }
}

/// Convert from rocksdb::Error
impl From<rocksdb::Error> for ProcessError {
    fn from(err: rocksdb::Error) -> Self {
        ProcessError::JournalRead(err.to_string())
    }
}

/// Convert from ractor::SpawnErr
impl From<ractor::SpawnErr> for ProcessError {
    fn from(err: ractor::SpawnErr) -> Self {
        ProcessError::Spawn(err.to_string())
    }
}
