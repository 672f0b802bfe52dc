//! Effect algebra
//!
//! A `ProcessAction` describes what a reaction to an event should do. Building
//! one performs no I/O and touches no process state; the process actor
//! interprets it later, step by step, in left-to-right order.

use std::{
    fmt::{self, Debug},
    sync::Arc
};

use crate::{
    domain::{
        command::{Command, CommandDelivery, OutcomeReplier, OutcomeSink},
        error::ProcessError,
        message::{DeliveryId, RejectionPayload}
    },
    port::entity::EntityRef
};

/// Current reaction of a process: maps an event to the effect it causes
pub type Behavior<E> = Arc<dyn Fn(&E) -> ProcessAction<E> + Send + Sync>;

/// Wrap a closure as a behavior
pub fn behavior<E, F>(f: F) -> Behavior<E>
where
    F: Fn(&E) -> ProcessAction<E> + Send + Sync + 'static
{
    Arc::new(f)
}

/// Registered reaction to a rejection of one specific delivery
pub type RejectionHandler<E> = Box<dyn FnOnce(RejectionPayload) -> Result<ProcessAction<E>, ProcessError> + Send>;

/// Type-erased command bound to its destination, re-sendable until confirmed
pub trait OutboundCommand: Send {
    fn destination(&self) -> &str;

    fn command_name(&self) -> &'static str;

    fn send(&self, delivery_id: DeliveryId, sink: &OutcomeSink) -> Result<(), ProcessError>;
}

struct TypedCommand<C: Command> {
    destination: Arc<dyn EntityRef<C>>,
    command:     C
}

impl<C: Command> OutboundCommand for TypedCommand<C> {
    fn destination(&self) -> &str {
        self.destination.address()
    }

    fn command_name(&self) -> &'static str {
        self.command.name()
    }

    fn send(&self, delivery_id: DeliveryId, sink: &OutcomeSink) -> Result<(), ProcessError> {
        self.destination.tell(CommandDelivery {
            delivery_id,
            command: self.command.clone(),
            reply_to: OutcomeReplier::new(delivery_id, sink.clone())
        })
    }
}

/// A command delivery request together with its rejection handler
pub struct CommandRequest<E> {
    pub command:     Box<dyn OutboundCommand>,
    pub on_rejected: RejectionHandler<E>
}

/// Description of a process reaction
pub enum ProcessAction<E> {
    /// Replace the current behavior
    ChangeState(Behavior<E>),
    /// Deliver a command at least once and register its rejection handler
    DeliverCommand(CommandRequest<E>),
    /// Run the left action, then the right one
    CompoundAction(Box<ProcessAction<E>>, Box<ProcessAction<E>>),
    /// Identity
    DoNothing
}

/// A single primitive step of an interpreted action
pub enum ProcessStep<E> {
    ChangeState(Behavior<E>),
    DeliverCommand(CommandRequest<E>)
}

impl<E: 'static> ProcessAction<E> {
    pub fn change_state<F>(f: F) -> Self
    where
        F: Fn(&E) -> ProcessAction<E> + Send + Sync + 'static
    {
        ProcessAction::ChangeState(Arc::new(f))
    }

    pub fn become_behavior(behavior: Behavior<E>) -> Self {
        ProcessAction::ChangeState(behavior)
    }

    /// Deliver `command` to `destination`; `on_rejected` runs if it is refused
    pub fn deliver_command<C, H>(destination: Arc<dyn EntityRef<C>>, command: C, on_rejected: H) -> Self
    where
        C: Command,
        H: FnOnce(C::Rejection) -> ProcessAction<E> + Send + 'static
    {
        let name = command.name();
        let on_rejected: RejectionHandler<E> = Box::new(move |payload| {
            let rejection = serde_json::from_value::<C::Rejection>(payload).map_err(|e| {
                ProcessError::Serialization(format!("Failed to decode rejection of {}: {}", name, e))
            })?;
            Ok(on_rejected(rejection))
        });

        ProcessAction::DeliverCommand(CommandRequest {
            command: Box::new(TypedCommand { destination, command }),
            on_rejected
        })
    }

    /// Deliver `command` to `destination`, ignoring a rejection
    pub fn deliver<C: Command>(destination: Arc<dyn EntityRef<C>>, command: C) -> Self {
        Self::deliver_command(destination, command, |_| ProcessAction::DoNothing)
    }

    /// Sequence `self` before `other`
    pub fn and(self, other: ProcessAction<E>) -> Self {
        match (self, other) {
            (ProcessAction::DoNothing, other) => other,
            (this, ProcessAction::DoNothing) => this,
            (this, other) => ProcessAction::CompoundAction(Box::new(this), Box::new(other))
        }
    }

    /// Flatten into primitive steps in execution order
    pub fn into_steps(self) -> Vec<ProcessStep<E>> {
        let mut steps = Vec::new();
        let mut stack = vec![self];

        while let Some(action) = stack.pop() {
            match action {
                ProcessAction::ChangeState(next) => steps.push(ProcessStep::ChangeState(next)),
                ProcessAction::DeliverCommand(request) => steps.push(ProcessStep::DeliverCommand(request)),
                ProcessAction::CompoundAction(left, right) => {
                    stack.push(*right);
                    stack.push(*left);
                }
                ProcessAction::DoNothing => {}
            }
        }

        steps
    }
}

impl<E> Default for ProcessAction<E> {
    fn default() -> Self {
        ProcessAction::DoNothing
    }
}

impl<E: 'static> FromIterator<ProcessAction<E>> for ProcessAction<E> {
    fn from_iter<I: IntoIterator<Item = ProcessAction<E>>>(iter: I) -> Self {
        iter.into_iter().fold(ProcessAction::DoNothing, ProcessAction::and)
    }
}

impl<E> Debug for ProcessAction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessAction::ChangeState(_) => f.write_str("ChangeState(..)"),
            ProcessAction::DeliverCommand(request) => write!(
                f,
                "DeliverCommand({} -> {})",
                request.command.command_name(),
                request.command.destination()
            ),
            ProcessAction::CompoundAction(left, right) => write!(f, "CompoundAction({:?}, {:?})", left, right),
            ProcessAction::DoNothing => f.write_str("DoNothing")
        }
    }
}
