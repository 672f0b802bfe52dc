//! Process log protocol
//!
//! The records below are the only durable representation of a process
//! instance. Behavior, pending deliveries and the set of processed message ids
//! are all derived from them by replay.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::domain::error::ProcessError;

/// Opaque identity of an inbound event message, used only for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh random id for callers that don't carry one of their own
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation token of one at-least-once command delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(u64);

impl DeliveryId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Rejection value as carried through the runtime; decoded back to the
/// command's declared rejection type by the handler registered at delivery
pub type RejectionPayload = serde_json::Value;

/// Answer of a destination entity to a delivered command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Accepted,
    Rejected(RejectionPayload)
}

/// Durable record kinds appended to a process instance's journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistentMessage<E> {
    /// A new inbound event was accepted
    EventEnvelope { message_id: MessageId, event: E },
    /// A delivered command was accepted by its destination
    CommandAccepted { delivery_id: DeliveryId },
    /// A delivered command was rejected by its destination
    CommandRejected { rejection: RejectionPayload, delivery_id: DeliveryId }
}

impl<E> PersistentMessage<E> {
    pub fn kind(&self) -> &'static str {
        match self {
            PersistentMessage::EventEnvelope { .. } => "event_envelope",
            PersistentMessage::CommandAccepted { .. } => "command_accepted",
            PersistentMessage::CommandRejected { .. } => "command_rejected"
        }
    }
}

impl<E: Serialize + DeserializeOwned> PersistentMessage<E> {
    /// Encode the record into a journal payload
    pub fn encode(&self) -> Result<Vec<u8>, ProcessError> {
        serde_json::to_vec(self)
            .map_err(|e| ProcessError::Serialization(format!("Failed to encode {} record: {}", self.kind(), e)))
    }

    /// Decode a journal payload back into a record
    pub fn decode(payload: &[u8]) -> Result<Self, ProcessError> {
        serde_json::from_slice(payload)
            .map_err(|e| ProcessError::Serialization(format!("Failed to decode process record: {}", e)))
    }
}
