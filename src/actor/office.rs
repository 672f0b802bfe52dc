//! ProcessOffice Actor - registry of the live instances of one process type
//!
//! The office owns every process instance of its type:
//! - Spawns a ProcessActor per process key on first use (linked, so it supervises it)
//! - Routes inbound events to the instance by key
//! - Runs the passivation handshake and buffers events for a passivating key
//! - Forgets failed instances; the next event recovers them from the journal

use std::{collections::HashMap, sync::Arc, time::Duration};

use ractor::{
    Actor, ActorId, ActorProcessingErr, ActorRef, MessagingErr, SupervisionEvent,
    concurrency::JoinHandle,
    rpc::{CallResult, call}
};
use tracing::{Level, event};

use crate::{
    actor::{
        message::{AckReply, EventAck, OfficeMessage, OfficeStats, ProcessMessage},
        process::{ProcessActor, ProcessArguments}
    },
    config::ProcessSettings,
    domain::{constant::office, error::ProcessError, message::MessageId},
    port::{journal::Journal, process::ProcessDefinition}
};

/// Start-up arguments of an office
pub struct OfficeArguments {
    pub journal:  Arc<dyn Journal>,
    pub settings: ProcessSettings
}

/// An event waiting for a passivating instance to finish stopping
struct BufferedEvent<E> {
    message_id: MessageId,
    event:      E,
    reply:      AckReply
}

/// Instance that was asked to stop, with the events that arrived meanwhile
struct Passivating<E> {
    actor:  ActorRef<ProcessMessage<E>>,
    buffer: Vec<BufferedEvent<E>>
}

/// ProcessOffice State
pub struct OfficeState<E> {
    journal:     Arc<dyn Journal>,
    settings:    ProcessSettings,
    /// Live instances (process_key -> actor)
    children:    HashMap<String, ActorRef<ProcessMessage<E>>>,
    passivating: HashMap<String, Passivating<E>>,
    stats:       OfficeStats
}

/// ProcessOffice Actor - one per process type
pub struct ProcessOffice<P: ProcessDefinition> {
    definition: Arc<P>
}

impl<P: ProcessDefinition> ProcessOffice<P> {
    pub fn new(definition: Arc<P>) -> Self {
        Self { definition }
    }

    /// Spawn an unnamed office for `definition`
    pub async fn spawn(
        definition: Arc<P>,
        journal: Arc<dyn Journal>,
        settings: ProcessSettings
    ) -> Result<(ActorRef<OfficeMessage<P::Event>>, JoinHandle<()>), ProcessError> {
        let (office, handle) =
            Actor::spawn(None, ProcessOffice::new(definition), OfficeArguments { journal, settings }).await?;
        Ok((office, handle))
    }
}

#[async_trait::async_trait]
impl<P: ProcessDefinition> Actor for ProcessOffice<P> {
    type Arguments = OfficeArguments;
    type Msg = OfficeMessage<P::Event>;
    type State = OfficeState<P::Event>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = office::OFFICE_STARTED, process_type = self.definition.process_type());

        Ok(OfficeState {
            journal:     args.journal,
            settings:    args.settings,
            children:    HashMap::new(),
            passivating: HashMap::new(),
            stats:       OfficeStats::default()
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            OfficeMessage::Deliver { process_key, message_id, event, reply } => {
                state.stats.events_routed += 1;

                if let Some(passivating) = state.passivating.get_mut(&process_key) {
                    event!(Level::DEBUG, event = office::EVENT_ROUTED, process_key = %process_key,
                           message_id = %message_id, message = "buffered_during_passivation");
                    passivating.buffer.push(BufferedEvent { message_id, event, reply });
                    return Ok(());
                }

                self.route(&myself, state, process_key, BufferedEvent { message_id, event, reply }).await;
            }
            OfficeMessage::Passivate { process_key } => {
                if let Some(actor) = state.children.remove(&process_key) {
                    event!(Level::DEBUG, event = office::PROCESS_PASSIVATED, process_key = %process_key,
                           message = "stop_requested");
                    if actor.cast(ProcessMessage::Stop).is_err() {
                        actor.stop(Some("passivated".to_string()));
                    }
                    state.passivating.insert(process_key, Passivating { actor, buffer: Vec::new() });
                }
            }
            OfficeMessage::PassivationCancelled { process_key } => {
                if let Some(Passivating { actor, buffer }) = state.passivating.remove(&process_key) {
                    event!(Level::DEBUG, event = office::PROCESS_PASSIVATED, process_key = %process_key,
                           message = "passivation_cancelled", buffered = buffer.len());
                    state.children.insert(process_key.clone(), actor);
                    for buffered in buffer {
                        self.route(&myself, state, process_key.clone(), buffered).await;
                    }
                }
            }
            OfficeMessage::Lookup { process_key, reply } => {
                let actor = state
                    .children
                    .get(&process_key)
                    .cloned()
                    .or_else(|| state.passivating.get(&process_key).map(|p| p.actor.clone()));
                if let Err(e) = reply.send(actor) {
                    event!(Level::WARN, event = office::EVENT_ROUTED, process_key = %process_key, error = %e);
                }
            }
            OfficeMessage::GetStats { reply } => {
                let stats = OfficeStats { active_processes: state.children.len(), ..state.stats.clone() };
                if let Err(e) = reply.send(stats) {
                    event!(Level::WARN, event = office::EVENT_ROUTED, error = %e);
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        let (cell, failure) = match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                event!(Level::DEBUG, event = office::PROCESS_TERMINATED, actor_id = %cell.get_id(),
                       reason = ?reason);
                (cell, None)
            }
            SupervisionEvent::ActorFailed(cell, error) => (cell, Some(error.to_string())),
            _ => return Ok(())
        };

        let actor_id = cell.get_id();

        if let Some(process_key) = find_key(&state.children, actor_id, |actor| actor.get_id()) {
            state.children.remove(&process_key);
            if let Some(error) = failure {
                state.stats.total_failed += 1;
                event!(Level::ERROR, event = office::PROCESS_FAILED, process_key = %process_key, error = %error);
            }
            return Ok(());
        }

        if let Some(process_key) = find_key(&state.passivating, actor_id, |passivating| passivating.actor.get_id()) {
            let Some(Passivating { buffer, .. }) = state.passivating.remove(&process_key) else {
                return Ok(());
            };

            match failure {
                Some(error) => {
                    state.stats.total_failed += 1;
                    event!(Level::ERROR, event = office::PROCESS_FAILED, process_key = %process_key, error = %error);
                }
                None => {
                    state.stats.total_passivated += 1;
                    event!(Level::INFO, event = office::PROCESS_PASSIVATED, process_key = %process_key,
                           buffered = buffer.len());
                }
            }

            // Events that arrived during the handshake go to a fresh incarnation
            for buffered in buffer {
                self.route(&myself, state, process_key.clone(), buffered).await;
            }
        }

        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        event!(Level::DEBUG, event = office::OFFICE_STOPPED, process_type = self.definition.process_type(),
               total_spawned = state.stats.total_spawned, total_passivated = state.stats.total_passivated);
        Ok(())
    }
}

fn find_key<V>(entries: &HashMap<String, V>, actor_id: ActorId, id_of: impl Fn(&V) -> ActorId) -> Option<String> {
    entries.iter().find(|(_, entry)| id_of(entry) == actor_id).map(|(key, _)| key.clone())
}

impl<P: ProcessDefinition> ProcessOffice<P> {
    /// Forward an event to the live instance for `process_key`, spawning it if needed
    async fn route(
        &self,
        myself: &ActorRef<OfficeMessage<P::Event>>,
        state: &mut OfficeState<P::Event>,
        process_key: String,
        buffered: BufferedEvent<P::Event>
    ) {
        let BufferedEvent { message_id, event, reply } = buffered;
        let mut message = ProcessMessage::Event { message_id, event, reply: Some(reply) };

        // A second attempt covers an instance that stopped before its termination was reported
        for _ in 0..2 {
            let actor = match state.children.get(&process_key) {
                Some(actor) => actor.clone(),
                None => match self.spawn_process(myself, state, &process_key).await {
                    Ok(actor) => actor,
                    Err(e) => {
                        reply_error(message, e);
                        return;
                    }
                }
            };

            match actor.cast(message) {
                Ok(()) => {
                    event!(Level::TRACE, event = office::EVENT_ROUTED, process_key = %process_key);
                    return;
                }
                Err(MessagingErr::SendErr(returned)) => {
                    state.children.remove(&process_key);
                    message = returned;
                }
                Err(e) => {
                    event!(Level::ERROR, event = office::EVENT_ROUTED, process_key = %process_key, error = %e);
                    return;
                }
            }
        }

        reply_error(message, ProcessError::Delivery(format!("Process '{}' is not reachable", process_key)));
    }

    async fn spawn_process(
        &self,
        myself: &ActorRef<OfficeMessage<P::Event>>,
        state: &mut OfficeState<P::Event>,
        process_key: &str
    ) -> Result<ActorRef<ProcessMessage<P::Event>>, ProcessError> {
        let args = ProcessArguments {
            process_key:    process_key.to_string(),
            persistence_id: self.definition.persistence_id(process_key),
            journal:        state.journal.clone(),
            settings:       state.settings.clone(),
            office:         Some(myself.clone())
        };

        match Actor::spawn_linked(None, ProcessActor::new(self.definition.clone()), args, myself.get_cell()).await {
            Ok((actor, _handle)) => {
                state.children.insert(process_key.to_string(), actor.clone());
                state.stats.total_spawned += 1;
                event!(Level::DEBUG, event = office::PROCESS_SPAWNED, process_key = %process_key,
                       total_spawned = state.stats.total_spawned);
                Ok(actor)
            }
            Err(e) => {
                event!(Level::ERROR, event = office::PROCESS_SPAWN_FAILED, process_key = %process_key, error = %e);
                state.stats.total_failed += 1;
                Err(ProcessError::from(e))
            }
        }
    }
}

fn reply_error<E>(message: ProcessMessage<E>, error: ProcessError) {
    if let ProcessMessage::Event { reply: Some(reply), .. } = message {
        let _ = reply.send(Err(error));
    }
}

/// Deliver an event to the process keyed by `process_key` and wait for its acknowledgment
pub async fn deliver_event<E: Send + 'static>(
    office: &ActorRef<OfficeMessage<E>>,
    process_key: &str,
    message_id: MessageId,
    event: E,
    timeout: Duration
) -> Result<EventAck, ProcessError> {
    match call(
        office,
        |reply| OfficeMessage::Deliver { process_key: process_key.to_string(), message_id, event, reply },
        Some(timeout)
    )
    .await
    {
        Ok(CallResult::Success(result)) => result,
        Ok(CallResult::Timeout) => {
            Err(ProcessError::Timeout(format!("Process '{}' did not acknowledge within {:?}", process_key, timeout)))
        }
        Ok(CallResult::SenderError) => {
            Err(ProcessError::Messaging(format!("Process '{}' dropped the event without an answer", process_key)))
        }
        Err(e) => Err(ProcessError::Messaging(format!("Failed to reach the office: {}", e)))
    }
}

/// Find the live instance for `process_key`, if any
pub async fn lookup_process<E: Send + 'static>(
    office: &ActorRef<OfficeMessage<E>>,
    process_key: &str,
    timeout: Duration
) -> Result<Option<ActorRef<ProcessMessage<E>>>, ProcessError> {
    match call(office, |reply| OfficeMessage::Lookup { process_key: process_key.to_string(), reply }, Some(timeout)).await
    {
        Ok(CallResult::Success(process)) => Ok(process),
        Ok(CallResult::Timeout) => Err(ProcessError::Timeout(format!("Lookup of '{}' timed out", process_key))),
        Ok(_) => Err(ProcessError::Messaging("Office dropped the lookup request".to_string())),
        Err(e) => Err(ProcessError::Messaging(format!("Failed to reach the office: {}", e)))
    }
}

/// Read the office statistics
pub async fn office_stats<E: Send + 'static>(
    office: &ActorRef<OfficeMessage<E>>,
    timeout: Duration
) -> Result<OfficeStats, ProcessError> {
    match call(office, |reply| OfficeMessage::<E>::GetStats { reply }, Some(timeout)).await {
        Ok(CallResult::Success(stats)) => Ok(stats),
        Ok(CallResult::Timeout) => Err(ProcessError::Timeout("Office statistics timed out".to_string())),
        Ok(_) => Err(ProcessError::Messaging("Office dropped the statistics request".to_string())),
        Err(e) => Err(ProcessError::Messaging(format!("Failed to reach the office: {}", e)))
    }
}
