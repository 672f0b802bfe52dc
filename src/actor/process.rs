//! ProcessActor - one persistent process manager instance
//!
//! Handles events and delivery outcomes for a single process key using:
//! - Behavior: the current event → effect function
//! - Journal: durable record log (persistence_id = process type + key)
//! - AtLeastOnceDelivery: unconfirmed commands and their redelivery
//!
//! Every record is journaled before it is applied, and the live path and the
//! recovery path apply records through the same code, so the volatile state
//! is always a fold of the journal.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant}
};

use ractor::{
    Actor, ActorProcessingErr, ActorRef, MessagingErr,
    concurrency::JoinHandle,
    rpc::{CallResult, call}
};
use tracing::{Level, event};

use crate::{
    actor::{
        delivery::AtLeastOnceDelivery,
        message::{AckReply, EventAck, OfficeMessage, ProcessMessage, ProcessSnapshot}
    },
    adapter::dedup::ProcessedMessages,
    config::ProcessSettings,
    domain::{
        action::{Behavior, CommandRequest, ProcessAction, ProcessStep, RejectionHandler},
        command::OutcomeSink,
        constant::process,
        error::ProcessError,
        message::{CommandOutcome, DeliveryId, MessageId, PersistentMessage}
    },
    port::{dedup::Deduplication, journal::Journal, process::ProcessDefinition}
};

/// Start-up arguments of a process instance
pub struct ProcessArguments<E> {
    pub process_key:    String,
    pub persistence_id: String,
    pub journal:        Arc<dyn Journal>,
    pub settings:       ProcessSettings,
    /// Owning office; a standalone instance stops itself when idle
    pub office:         Option<ActorRef<OfficeMessage<E>>>
}

/// Whether effects are interpreted live or while replaying the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    Replay
}

/// ProcessActor State
pub struct ProcessState<E> {
    process_key:      String,
    persistence_id:   String,
    behavior:         Behavior<E>,
    /// Rejection handlers of unconfirmed deliveries
    handlers:         HashMap<DeliveryId, RejectionHandler<E>>,
    delivery:         AtLeastOnceDelivery,
    processed:        Box<dyn Deduplication>,
    journal:          Arc<dyn Journal>,
    last_sequence_nr: u64,
    sink:             OutcomeSink,
    settings:         ProcessSettings,
    office:           Option<ActorRef<OfficeMessage<E>>>,
    passivating:      bool,
    redelivery_timer: Option<JoinHandle<()>>,
    idle_timer:       Option<JoinHandle<Result<(), MessagingErr<ProcessMessage<E>>>>>
}

/// ProcessActor - persistent process manager for one process key
pub struct ProcessActor<P: ProcessDefinition> {
    definition: Arc<P>
}

impl<P: ProcessDefinition> ProcessActor<P> {
    pub fn new(definition: Arc<P>) -> Self {
        Self { definition }
    }
}

#[async_trait::async_trait]
impl<P: ProcessDefinition> Actor for ProcessActor<P> {
    type Arguments = ProcessArguments<P::Event>;
    type Msg = ProcessMessage<P::Event>;
    type State = ProcessState<P::Event>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = process::PROCESS_STARTED, persistence_id = %args.persistence_id);

        let mut state = ProcessState {
            process_key:      args.process_key,
            persistence_id:   args.persistence_id,
            behavior:         self.definition.initial_behavior(),
            handlers:         HashMap::new(),
            delivery:         AtLeastOnceDelivery::new(args.settings.delivery_settings()),
            processed:        Box::new(ProcessedMessages::new()),
            journal:          args.journal,
            last_sequence_nr: 0,
            sink:             outcome_sink(&myself),
            settings:         args.settings,
            office:           args.office,
            passivating:      false,
            redelivery_timer: None,
            idle_timer:       None
        };

        if let Err(e) = state.recover().await {
            event!(Level::ERROR, event = process::RECOVERY_FAILED,
                   persistence_id = %state.persistence_id, error = %e);
            return Err(e.into());
        }

        Ok(state)
    }

    async fn post_start(&self, myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        // Deliveries restored by recovery were never sent by this incarnation
        state.delivery.redeliver_overdue(Instant::now(), &state.sink);

        state.redelivery_timer =
            Some(myself.send_interval(state.settings.redeliver_interval(), || ProcessMessage::RedeliveryTick));
        state.arm_idle_timer(&myself);

        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ProcessMessage::Event { message_id, event, reply } => {
                state.handle_event(message_id, event, reply).await?;
                state.arm_idle_timer(&myself);
            }
            ProcessMessage::Outcome { delivery_id, outcome } => {
                state.handle_outcome(delivery_id, outcome).await?;
                state.arm_idle_timer(&myself);
            }
            ProcessMessage::RedeliveryTick => {
                state.delivery.redeliver_overdue(Instant::now(), &state.sink);
            }
            ProcessMessage::ReceiveTimeout => state.handle_receive_timeout(&myself),
            ProcessMessage::Stop => state.handle_stop(&myself),
            ProcessMessage::Inspect { reply } => {
                if let Err(e) = reply.send(state.snapshot()) {
                    event!(Level::WARN, event = process::ACK_FAILED, persistence_id = %state.persistence_id,
                           error = %e);
                }
            }
        }

        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        if let Some(timer) = state.redelivery_timer.take() {
            timer.abort();
        }
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }

        event!(Level::DEBUG, event = process::PROCESS_STOPPED, persistence_id = %state.persistence_id,
               outstanding = state.delivery.outstanding_unconfirmed());
        Ok(())
    }
}

/// Read the volatile state of a live process instance
pub async fn inspect_process<E: Send + 'static>(
    process: &ActorRef<ProcessMessage<E>>,
    timeout: Duration
) -> Result<ProcessSnapshot, ProcessError> {
    match call(process, |reply| ProcessMessage::<E>::Inspect { reply }, Some(timeout)).await {
        Ok(CallResult::Success(snapshot)) => Ok(snapshot),
        Ok(CallResult::Timeout) => Err(ProcessError::Timeout("Process inspection timed out".to_string())),
        Ok(_) => Err(ProcessError::Messaging("Process dropped the inspection request".to_string())),
        Err(e) => Err(ProcessError::Messaging(format!("Failed to reach the process: {}", e)))
    }
}

/// Route destination outcomes back into the process mailbox
fn outcome_sink<E: Send + 'static>(myself: &ActorRef<ProcessMessage<E>>) -> OutcomeSink {
    let myself = myself.clone();
    Arc::new(move |delivery_id, outcome| {
        // A stopped incarnation drops the outcome; the next one redelivers
        let _ = myself.cast(ProcessMessage::Outcome { delivery_id, outcome });
    })
}

impl<E: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static> ProcessState<E> {
    /// Rebuild behavior, pending deliveries and processed ids from the journal
    async fn recover(&mut self) -> Result<(), ProcessError> {
        event!(Level::DEBUG, event = process::RECOVERY_STARTED, persistence_id = %self.persistence_id);

        let entries = self
            .journal
            .replay(&self.persistence_id, 1)
            .await
            .map_err(|e| ProcessError::Recovery(format!("Failed to replay '{}': {}", self.persistence_id, e)))?;

        let replayed = entries.len();
        for entry in entries {
            let record = PersistentMessage::<E>::decode(&entry.payload).map_err(|e| {
                ProcessError::Recovery(format!(
                    "Record {} of '{}' is unreadable: {}",
                    entry.sequence_nr, self.persistence_id, e
                ))
            })?;

            self.apply(record, Mode::Replay);
            self.last_sequence_nr = entry.sequence_nr;
        }

        event!(Level::INFO, event = process::RECOVERY_COMPLETED, persistence_id = %self.persistence_id,
               records = replayed, outstanding = self.delivery.outstanding_unconfirmed());
        Ok(())
    }

    async fn handle_event(&mut self, message_id: MessageId, event: E, reply: Option<AckReply>) -> Result<(), ProcessError> {
        event!(Level::DEBUG, event = process::EVENT_RECEIVED, persistence_id = %self.persistence_id,
               message_id = %message_id);

        if self.processed.has_processed(&message_id) {
            event!(Level::DEBUG, event = process::EVENT_DUPLICATE, persistence_id = %self.persistence_id,
                   message_id = %message_id);
            self.acknowledge(reply, Ok(EventAck::Duplicate { message_id }));
            return Ok(());
        }

        let record = PersistentMessage::EventEnvelope { message_id: message_id.clone(), event };
        let sequence_nr = match self.persist(&record).await {
            Ok(sequence_nr) => sequence_nr,
            Err(e) => {
                self.acknowledge(reply, Err(e.clone()));
                return if e.is_fatal() { Err(e) } else { Ok(()) };
            }
        };

        self.apply(record, Mode::Live);

        event!(Level::DEBUG, event = process::EVENT_PROCESSED, persistence_id = %self.persistence_id,
               message_id = %message_id, sequence_nr, outstanding = self.delivery.outstanding_unconfirmed());
        self.acknowledge(reply, Ok(EventAck::Processed { message_id, sequence_nr }));
        Ok(())
    }

    async fn handle_outcome(&mut self, delivery_id: DeliveryId, outcome: CommandOutcome) -> Result<(), ProcessError> {
        // Repeated answers to a redelivered command land here once the first was recorded
        if !self.delivery.is_unconfirmed(delivery_id) && !self.handlers.contains_key(&delivery_id) {
            event!(Level::WARN, event = process::OUTCOME_UNKNOWN_DELIVERY, persistence_id = %self.persistence_id,
                   delivery_id = %delivery_id);
            return Ok(());
        }

        let record = match outcome {
            CommandOutcome::Accepted => PersistentMessage::CommandAccepted { delivery_id },
            CommandOutcome::Rejected(rejection) => PersistentMessage::CommandRejected { rejection, delivery_id }
        };
        match self.persist(&record).await {
            Ok(_) => self.apply(record, Mode::Live),
            Err(e) if e.is_fatal() => return Err(e),
            // Logged by persist; the delivery stays unconfirmed and its redelivery is answered again
            Err(_) => {}
        }

        Ok(())
    }

    fn handle_receive_timeout(&mut self, myself: &ActorRef<ProcessMessage<E>>) {
        if self.passivating {
            return;
        }

        let outstanding = self.delivery.outstanding_unconfirmed();
        if outstanding > 0 {
            event!(Level::DEBUG, event = process::PASSIVATION_DEFERRED, persistence_id = %self.persistence_id,
                   outstanding);
            self.arm_idle_timer(myself);
            return;
        }

        event!(Level::INFO, event = process::PASSIVATION_REQUESTED, persistence_id = %self.persistence_id);
        self.passivating = true;

        match &self.office {
            Some(office) => {
                let requested = office.cast(OfficeMessage::Passivate { process_key: self.process_key.clone() });
                if requested.is_err() {
                    myself.stop(Some("passivated".to_string()));
                }
            }
            None => myself.stop(Some("passivated".to_string()))
        }
    }

    /// The office's stop request; everything it routed earlier has been handled by now
    fn handle_stop(&mut self, myself: &ActorRef<ProcessMessage<E>>) {
        let outstanding = self.delivery.outstanding_unconfirmed();
        if outstanding == 0 {
            myself.stop(Some("passivated".to_string()));
            return;
        }

        event!(Level::DEBUG, event = process::PASSIVATION_DEFERRED, persistence_id = %self.persistence_id,
               outstanding, message = "passivation_cancelled");
        self.passivating = false;

        if let Some(office) = &self.office {
            let _ = office.cast(OfficeMessage::PassivationCancelled { process_key: self.process_key.clone() });
        }
        self.arm_idle_timer(myself);
    }

    /// Append a record; no state changes until the journal confirms it
    async fn persist(&mut self, record: &PersistentMessage<E>) -> Result<u64, ProcessError> {
        let payload = record.encode().map_err(|e| {
            event!(Level::ERROR, event = process::RECORD_PERSIST_FAILED, persistence_id = %self.persistence_id,
                   kind = record.kind(), error = %e);
            e
        })?;

        match self.journal.append(&self.persistence_id, payload).await {
            Ok(sequence_nr) => {
                self.last_sequence_nr = sequence_nr;
                event!(Level::TRACE, event = process::RECORD_PERSISTED, persistence_id = %self.persistence_id,
                       kind = record.kind(), sequence_nr);
                Ok(sequence_nr)
            }
            Err(e) => {
                event!(Level::ERROR, event = process::RECORD_PERSIST_FAILED, persistence_id = %self.persistence_id,
                       kind = record.kind(), error = %e);
                Err(ProcessError::JournalWrite(e.to_string()))
            }
        }
    }

    /// Apply one journaled record; shared by the live path and recovery
    fn apply(&mut self, record: PersistentMessage<E>, mode: Mode) {
        match record {
            PersistentMessage::EventEnvelope { message_id, event } => {
                let behavior = self.behavior.clone();
                self.interpret(behavior(&event), mode);
                self.processed.mark_processed(message_id);
            }
            PersistentMessage::CommandAccepted { delivery_id } => {
                if mode == Mode::Live {
                    event!(Level::DEBUG, event = process::COMMAND_ACCEPTED, persistence_id = %self.persistence_id,
                           delivery_id = %delivery_id);
                }
                self.handlers.remove(&delivery_id);
                self.delivery.confirm(delivery_id);
            }
            PersistentMessage::CommandRejected { rejection, delivery_id } => {
                if mode == Mode::Live {
                    event!(Level::DEBUG, event = process::COMMAND_REJECTED, persistence_id = %self.persistence_id,
                           delivery_id = %delivery_id, rejection = %rejection);
                }

                match self.handlers.remove(&delivery_id) {
                    Some(handler) => match handler(rejection) {
                        Ok(action) => self.interpret(action, mode),
                        Err(e) => {
                            event!(Level::ERROR, event = process::REJECTION_UNHANDLED,
                                   persistence_id = %self.persistence_id, delivery_id = %delivery_id, error = %e);
                        }
                    },
                    // Every journaled outcome follows the event that registered its delivery
                    None => {
                        event!(Level::ERROR, event = process::REPLAY_ORDERING_VIOLATION,
                               persistence_id = %self.persistence_id, delivery_id = %delivery_id,
                               replaying = mode == Mode::Replay);
                    }
                }

                self.delivery.confirm(delivery_id);
            }
        }
    }

    /// Interpret an action left to right
    fn interpret(&mut self, action: ProcessAction<E>, mode: Mode) {
        for step in action.into_steps() {
            match step {
                ProcessStep::ChangeState(next) => {
                    self.behavior = next;
                    event!(Level::TRACE, event = process::BEHAVIOR_CHANGED, persistence_id = %self.persistence_id);
                }
                ProcessStep::DeliverCommand(CommandRequest { command, on_rejected }) => {
                    let sink = (mode == Mode::Live).then_some(&self.sink);
                    let delivery_id = self.delivery.deliver(command, sink);
                    self.handlers.insert(delivery_id, on_rejected);
                }
            }
        }
    }

    fn acknowledge(&self, reply: Option<AckReply>, ack: Result<EventAck, ProcessError>) {
        if let Some(reply) = reply {
            if let Err(e) = reply.send(ack) {
                event!(Level::WARN, event = process::ACK_FAILED, persistence_id = %self.persistence_id, error = %e);
            }
        }
    }

    fn arm_idle_timer(&mut self, myself: &ActorRef<ProcessMessage<E>>) {
        let Some(timeout) = self.settings.idle_timeout() else {
            return;
        };

        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
        self.idle_timer = Some(myself.send_after(timeout, || ProcessMessage::ReceiveTimeout));
    }

    fn snapshot(&self) -> ProcessSnapshot {
        let mut pending_deliveries: Vec<DeliveryId> = self.handlers.keys().copied().collect();
        pending_deliveries.sort();

        ProcessSnapshot {
            persistence_id: self.persistence_id.clone(),
            last_sequence_nr: self.last_sequence_nr,
            pending_deliveries,
            outstanding_unconfirmed: self.delivery.outstanding_unconfirmed(),
            processed_messages: self.processed.processed_count(),
            passivating: self.passivating
        }
    }
}
