//! Commands sent by a process to destination entities, and the reply handle a
//! destination uses to accept or reject them.

use std::{
    fmt::{self, Debug},
    marker::PhantomData,
    sync::Arc
};

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::{
    error::ProcessError,
    message::{CommandOutcome, DeliveryId}
};

/// A command addressed to another entity
///
/// Every command type declares exactly one rejection type; the pairing is
/// checked where a rejection handler is registered.
pub trait Command: Clone + Debug + Send + Sync + 'static {
    /// What the destination answers when it refuses the command
    type Rejection: Serialize + DeserializeOwned + Debug + Send + 'static;

    /// Command name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>().rsplit("::").next().unwrap_or("command")
    }
}

/// Where destination outcomes are routed back to (the owning process instance)
pub type OutcomeSink = Arc<dyn Fn(DeliveryId, CommandOutcome) + Send + Sync>;

/// Reply handle handed to the destination together with the command
pub struct OutcomeReplier<R> {
    delivery_id: DeliveryId,
    sink:        OutcomeSink,
    _rejection:  PhantomData<fn(R)>
}

impl<R> Clone for OutcomeReplier<R> {
    fn clone(&self) -> Self {
        Self { delivery_id: self.delivery_id, sink: self.sink.clone(), _rejection: PhantomData }
    }
}

impl<R> Debug for OutcomeReplier<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeReplier").field("delivery_id", &self.delivery_id).finish()
    }
}

impl<R: Serialize> OutcomeReplier<R> {
    pub fn new(delivery_id: DeliveryId, sink: OutcomeSink) -> Self {
        Self { delivery_id, sink, _rejection: PhantomData }
    }

    /// Tell the process the command was accepted
    pub fn accept(&self) {
        (self.sink)(self.delivery_id, CommandOutcome::Accepted);
    }

    /// Tell the process the command was rejected
    pub fn reject(&self, rejection: &R) -> Result<(), ProcessError> {
        let payload = serde_json::to_value(rejection)?;
        (self.sink)(self.delivery_id, CommandOutcome::Rejected(payload));
        Ok(())
    }
}

/// One delivery attempt of a command, as seen by the destination
pub struct CommandDelivery<C: Command> {
    pub delivery_id: DeliveryId,
    pub command:     C,
    pub reply_to:    OutcomeReplier<C::Rejection>
}

impl<C: Command> Debug for CommandDelivery<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDelivery")
            .field("delivery_id", &self.delivery_id)
            .field("command", &self.command)
            .finish()
    }
}
