//! Destination entities hosted as ractor actors

use ractor::{ActorRef, Message};

use crate::{
    domain::{
        command::{Command, CommandDelivery},
        error::ProcessError
    },
    port::entity::EntityRef
};

/// Mailbox message of an actor that accepts commands of type `C`
#[derive(Debug)]
pub struct EntityEnvelope<C: Command>(pub CommandDelivery<C>);

impl<C: Command> Message for EntityEnvelope<C> {}

/// EntityRef backed by a local actor
pub struct ActorEntityRef<C: Command> {
    address: String,
    actor:   ActorRef<EntityEnvelope<C>>
}

impl<C: Command> ActorEntityRef<C> {
    pub fn new(address: impl Into<String>, actor: ActorRef<EntityEnvelope<C>>) -> Self {
        Self { address: address.into(), actor }
    }
}

impl<C: Command> EntityRef<C> for ActorEntityRef<C> {
    fn address(&self) -> &str {
        &self.address
    }

    fn tell(&self, delivery: CommandDelivery<C>) -> Result<(), ProcessError> {
        self.actor
            .cast(EntityEnvelope(delivery))
            .map_err(|e| ProcessError::Delivery(format!("Failed to reach '{}': {}", self.address, e)))
    }
}
