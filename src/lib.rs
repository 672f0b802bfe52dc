//! # Saga Runtime
//!
//! Persistent process managers (sagas) on top of ractor actors.
//!
//! A process reacts to domain events by changing its behavior and delivering
//! commands to other entities with at-least-once semantics:
//! - Every inbound event, accepted command and rejected command is journaled
//!   before it takes effect
//! - Recovery replays the journal through the same code as the live path
//! - Inbound messages are deduplicated by message id
//! - Rejections are routed to the handler registered with the delivery
//! - Idle instances are passivated only once nothing is left unconfirmed

pub mod actor;
pub mod adapter;
pub mod cli;
pub mod config;
pub mod demo;
pub mod domain;
pub mod port;

#[cfg(test)]
mod testkit;

pub use actor::{
    EventAck, OfficeStats, ProcessActor, ProcessOffice, ProcessSnapshot, deliver_event, inspect_process, lookup_process,
    office_stats
};
pub use adapter::{
    entity::{ActorEntityRef, EntityEnvelope},
    journal::{InMemoryJournal, JournalFactory, JournalType}
};
pub use config::{ProcessSettings, RuntimeConfig};
pub use domain::{
    action::{Behavior, ProcessAction, behavior},
    command::{Command, CommandDelivery, OutcomeReplier},
    error::ProcessError,
    message::{CommandOutcome, DeliveryId, MessageId}
};
pub use port::{entity::EntityRef, journal::Journal, process::ProcessDefinition};
