//! Typed messages for actor communication

use ractor::{Message, RpcReplyPort};

use crate::domain::{
    error::ProcessError,
    message::{CommandOutcome, DeliveryId, MessageId}
};

/// Acknowledgment of an inbound event message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAck {
    /// The event was journaled and its effect interpreted
    Processed { message_id: MessageId, sequence_nr: u64 },
    /// The message id was already processed; nothing happened
    Duplicate { message_id: MessageId }
}

impl EventAck {
    pub fn message_id(&self) -> &MessageId {
        match self {
            EventAck::Processed { message_id, .. } | EventAck::Duplicate { message_id } => message_id
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, EventAck::Duplicate { .. })
    }
}

pub type AckReply = RpcReplyPort<Result<EventAck, ProcessError>>;

/// Messages for ProcessActor (one per process instance)
#[derive(Debug)]
pub enum ProcessMessage<E> {
    /// Inbound domain event
    Event { message_id: MessageId, event: E, reply: Option<AckReply> },
    /// Answer of a destination to a delivered command
    Outcome { delivery_id: DeliveryId, outcome: CommandOutcome },
    /// Periodic redelivery of unconfirmed commands
    RedeliveryTick,
    /// Idle timeout fired
    ReceiveTimeout,
    /// Office-confirmed passivation; honored only with no outstanding deliveries
    Stop,
    /// Diagnostics snapshot
    Inspect { reply: RpcReplyPort<ProcessSnapshot> }
}

/// Point-in-time view of a process instance's volatile state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub persistence_id:          String,
    pub last_sequence_nr:        u64,
    /// Delivery ids with a registered rejection handler, ascending
    pub pending_deliveries:      Vec<DeliveryId>,
    pub outstanding_unconfirmed: usize,
    pub processed_messages:      usize,
    pub passivating:             bool
}

/// Messages for the ProcessOffice actor (registry of process instances)
#[derive(Debug)]
pub enum OfficeMessage<E> {
    /// Route an event to the process keyed by `process_key`, spawning it if needed
    Deliver { process_key: String, message_id: MessageId, event: E, reply: AckReply },
    /// A process asks to be evicted from memory
    Passivate { process_key: String },
    /// A passivating process received new work and stays alive
    PassivationCancelled { process_key: String },
    /// Look up the live process for `process_key`
    Lookup { process_key: String, reply: RpcReplyPort<Option<ractor::ActorRef<ProcessMessage<E>>>> },
    /// Office statistics
    GetStats { reply: RpcReplyPort<OfficeStats> }
}

/// Office statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfficeStats {
    pub active_processes: usize,
    pub total_spawned:    u64,
    pub total_passivated: u64,
    pub total_failed:     u64,
    pub events_routed:    u64
}

// Implement Message trait for Ractor
impl<E: Send + 'static> Message for ProcessMessage<E> {}
impl<E: Send + 'static> Message for OfficeMessage<E> {}
