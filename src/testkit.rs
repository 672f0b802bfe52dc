//! Shared fixtures for unit tests

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering}
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer, ser::Error as _};

use crate::{
    adapter::journal::InMemoryJournal,
    config::ProcessSettings,
    domain::{
        action::{Behavior, ProcessAction, behavior},
        command::{Command, CommandDelivery, OutcomeReplier, OutcomeSink},
        error::ProcessError,
        message::{DeliveryId, PersistentMessage}
    },
    port::{
        entity::EntityRef,
        journal::{Journal, JournalEntry},
        process::ProcessDefinition
    }
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SagaEvent {
    Probe,
    Started,
    Audit,
    Unencodable(Unencodable)
}

/// Payload whose serialization always fails
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Unencodable;

impl Serialize for Unencodable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("unencodable payload"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Begin {
    pub attempt: u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BeginRejected {
    Busy,
    Closed
}

impl Command for Begin {
    type Rejection = BeginRejected;
}

/// Destination that records every delivery attempt
pub struct RecordingEntity<C: Command> {
    address:     String,
    deliveries:  Mutex<Vec<(DeliveryId, C, OutcomeReplier<C::Rejection>)>>,
    unreachable: AtomicBool
}

impl<C: Command> RecordingEntity<C> {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address:     address.to_string(),
            deliveries:  Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false)
        })
    }

    pub fn entity_ref(self: &Arc<Self>) -> Arc<dyn EntityRef<C>> {
        self.clone()
    }

    pub fn deliveries(&self) -> Vec<(DeliveryId, C)> {
        self.deliveries.lock().unwrap().iter().map(|(id, command, _)| (*id, command.clone())).collect()
    }

    /// Reply handle of the latest attempt of `delivery_id`
    pub fn replier(&self, delivery_id: DeliveryId) -> OutcomeReplier<C::Rejection> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _, _)| *id == delivery_id)
            .map(|(_, _, replier)| replier.clone())
            .unwrap_or_else(|| panic!("{} was never delivered to {}", delivery_id, self.address))
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

impl<C: Command> EntityRef<C> for RecordingEntity<C> {
    fn address(&self) -> &str {
        &self.address
    }

    fn tell(&self, delivery: CommandDelivery<C>) -> Result<(), ProcessError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ProcessError::Delivery(format!("{} is unreachable", self.address)));
        }
        self.deliveries.lock().unwrap().push((delivery.delivery_id, delivery.command, delivery.reply_to));
        Ok(())
    }
}

pub fn noop_sink() -> OutcomeSink {
    Arc::new(|_, _| {})
}

/// Settings without timers getting in the way of a test
pub fn quiet_settings() -> ProcessSettings {
    ProcessSettings { idle_timeout_ms: None, redeliver_interval_ms: 3_600_000, ..ProcessSettings::default() }
}

/// Journal of `persistence_id` as readable tags
pub async fn journal_records(journal: &InMemoryJournal, persistence_id: &str) -> Vec<String> {
    journal
        .replay(persistence_id, 1)
        .await
        .unwrap()
        .iter()
        .map(|entry| match PersistentMessage::<SagaEvent>::decode(&entry.payload).unwrap() {
            PersistentMessage::EventEnvelope { message_id, .. } => format!("event_envelope:{}", message_id),
            PersistentMessage::CommandAccepted { delivery_id } => format!("command_accepted:{}", delivery_id),
            PersistentMessage::CommandRejected { rejection, delivery_id } => {
                format!("command_rejected:{}:{}", delivery_id, rejection)
            }
        })
        .collect()
}

/// In-memory journal whose appends can be switched to fail
#[derive(Default)]
pub struct FailingJournal {
    inner:        InMemoryJournal,
    fail_appends: AtomicBool
}

impl FailingJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Journal for FailingJournal {
    async fn append(&self, persistence_id: &str, payload: Vec<u8>) -> Result<u64, ProcessError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(ProcessError::JournalWrite("disk full".to_string()));
        }
        self.inner.append(persistence_id, payload).await
    }

    async fn replay(&self, persistence_id: &str, from_sequence_nr: u64) -> Result<Vec<JournalEntry>, ProcessError> {
        self.inner.replay(persistence_id, from_sequence_nr).await
    }

    async fn highest_sequence_nr(&self, persistence_id: &str) -> Result<u64, ProcessError> {
        self.inner.highest_sequence_nr(persistence_id).await
    }

    async fn persistence_ids(&self) -> Result<Vec<String>, ProcessError> {
        self.inner.persistence_ids().await
    }
}

/// Process used across the actor tests
///
/// - `Started` delivers `Begin { attempt: 1 }`; a `Busy` rejection switches to
///   the retrying behavior and delivers `Begin { attempt: 2 }`
/// - `Audit` delivers `Begin { attempt: 0 }` and records any rejection
pub struct TestSaga {
    pub destination: Arc<RecordingEntity<Begin>>,
    audit:           Arc<Mutex<Vec<BeginRejected>>>
}

impl TestSaga {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { destination: RecordingEntity::new("begin-gate"), audit: Arc::new(Mutex::new(Vec::new())) })
    }

    pub fn audit_rejections(&self) -> Vec<BeginRejected> {
        self.audit.lock().unwrap().clone()
    }

    fn parts(&self) -> SagaParts {
        SagaParts { destination: self.destination.clone(), audit: self.audit.clone() }
    }
}

#[derive(Clone)]
struct SagaParts {
    destination: Arc<RecordingEntity<Begin>>,
    audit:       Arc<Mutex<Vec<BeginRejected>>>
}

impl SagaParts {
    fn initial(self) -> Behavior<SagaEvent> {
        behavior(move |event| match event {
            SagaEvent::Started => {
                let parts = self.clone();
                ProcessAction::deliver_command(self.destination.entity_ref(), Begin { attempt: 1 }, move |rejection| {
                    match rejection {
                        BeginRejected::Busy => parts.retry(),
                        BeginRejected::Closed => ProcessAction::DoNothing
                    }
                })
            }
            SagaEvent::Audit => self.audit(),
            SagaEvent::Probe | SagaEvent::Unencodable(_) => ProcessAction::DoNothing
        })
    }

    fn retrying(self) -> Behavior<SagaEvent> {
        behavior(move |event| match event {
            SagaEvent::Started => ProcessAction::deliver(self.destination.entity_ref(), Begin { attempt: 2 }),
            SagaEvent::Audit => self.audit(),
            SagaEvent::Probe | SagaEvent::Unencodable(_) => ProcessAction::DoNothing
        })
    }

    fn retry(self) -> ProcessAction<SagaEvent> {
        let destination = self.destination.entity_ref();
        ProcessAction::become_behavior(self.retrying()).and(ProcessAction::deliver(destination, Begin { attempt: 2 }))
    }

    fn audit(&self) -> ProcessAction<SagaEvent> {
        let audit = self.audit.clone();
        ProcessAction::deliver_command(self.destination.entity_ref(), Begin { attempt: 0 }, move |rejection| {
            audit.lock().unwrap().push(rejection);
            ProcessAction::DoNothing
        })
    }
}

impl ProcessDefinition for TestSaga {
    type Event = SagaEvent;

    fn process_type(&self) -> &str {
        "test-saga"
    }

    fn initial_behavior(&self) -> Behavior<SagaEvent> {
        self.parts().initial()
    }
}
