//! At-least-once delivery bookkeeping for one process instance
//!
//! Delivery ids are allocated from a counter that restarts at 1 with every
//! incarnation. Because recovery re-interprets every journaled effect in
//! order, the replayed deliveries get the very ids they had before the crash.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant}
};

use tracing::{Level, event};

use crate::domain::{
    action::OutboundCommand, command::OutcomeSink, constant::delivery, error::ProcessError, message::DeliveryId
};

/// Tuning of the redelivery loop
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub redeliver_interval:     Duration,
    pub redelivery_burst_limit: usize,
    pub warn_after_attempts:    u32
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self { redeliver_interval: Duration::from_secs(5), redelivery_burst_limit: 10_000, warn_after_attempts: 5 }
    }
}

struct UnconfirmedDelivery {
    command:   Box<dyn OutboundCommand>,
    attempts:  u32,
    /// None until the first send (deliveries registered during recovery)
    last_sent: Option<Instant>
}

/// Unconfirmed deliveries of one process instance
pub struct AtLeastOnceDelivery {
    settings:         DeliverySettings,
    next_delivery_id: u64,
    unconfirmed:      BTreeMap<DeliveryId, UnconfirmedDelivery>
}

impl AtLeastOnceDelivery {
    pub fn new(settings: DeliverySettings) -> Self {
        Self { settings, next_delivery_id: 1, unconfirmed: BTreeMap::new() }
    }

    /// Allocate a delivery id for `command` and, unless recovering, send it
    ///
    /// A failed send is not an error for the caller: the delivery stays
    /// unconfirmed and is retried by `redeliver_overdue`.
    pub fn deliver(&mut self, command: Box<dyn OutboundCommand>, sink: Option<&OutcomeSink>) -> DeliveryId {
        let delivery_id = DeliveryId::new(self.next_delivery_id);
        self.next_delivery_id += 1;

        let mut pending = UnconfirmedDelivery { command, attempts: 0, last_sent: None };

        match sink {
            Some(sink) => {
                Self::send(delivery_id, &mut pending, sink, Instant::now());
                event!(Level::DEBUG, event = delivery::COMMAND_DELIVERED, delivery_id = %delivery_id,
                       command = pending.command.command_name(), destination = pending.command.destination());
            }
            None => {
                event!(Level::TRACE, event = delivery::COMMAND_REGISTERED, delivery_id = %delivery_id,
                       command = pending.command.command_name(), destination = pending.command.destination());
            }
        }

        self.unconfirmed.insert(delivery_id, pending);
        delivery_id
    }

    /// Drop a delivery once its outcome is recorded; false if it was unknown
    pub fn confirm(&mut self, delivery_id: DeliveryId) -> bool {
        let confirmed = self.unconfirmed.remove(&delivery_id).is_some();
        if confirmed {
            event!(Level::TRACE, event = delivery::DELIVERY_CONFIRMED, delivery_id = %delivery_id);
        }
        confirmed
    }

    pub fn is_unconfirmed(&self, delivery_id: DeliveryId) -> bool {
        self.unconfirmed.contains_key(&delivery_id)
    }

    pub fn outstanding_unconfirmed(&self) -> usize {
        self.unconfirmed.len()
    }

    /// Resend deliveries never sent or not sent within the redeliver interval
    ///
    /// At most `redelivery_burst_limit` deliveries are sent per call. Returns
    /// the ids that were sent.
    pub fn redeliver_overdue(&mut self, now: Instant, sink: &OutcomeSink) -> Vec<DeliveryId> {
        let interval = self.settings.redeliver_interval;
        let warn_after = self.settings.warn_after_attempts;

        let overdue: Vec<DeliveryId> = self
            .unconfirmed
            .iter()
            .filter(|(_, pending)| pending.last_sent.is_none_or(|sent| now.saturating_duration_since(sent) >= interval))
            .map(|(id, _)| *id)
            .take(self.settings.redelivery_burst_limit)
            .collect();

        let mut warnings = Vec::new();

        for delivery_id in &overdue {
            if let Some(pending) = self.unconfirmed.get_mut(delivery_id) {
                Self::send(*delivery_id, pending, sink, now);
                event!(Level::DEBUG, event = delivery::COMMAND_REDELIVERED, delivery_id = %delivery_id,
                       command = pending.command.command_name(), attempts = pending.attempts);

                if warn_after > 0 && pending.attempts == warn_after {
                    warnings.push(format!("{}@{}", delivery_id, pending.command.destination()));
                }
            }
        }

        if !warnings.is_empty() {
            event!(Level::WARN, event = delivery::UNCONFIRMED_WARNING, attempts = warn_after,
                   deliveries = ?warnings);
        }

        overdue
    }

    fn send(delivery_id: DeliveryId, pending: &mut UnconfirmedDelivery, sink: &OutcomeSink, now: Instant) {
        pending.attempts += 1;
        pending.last_sent = Some(now);

        if let Err(e) = pending.command.send(delivery_id, sink) {
            Self::log_send_failure(delivery_id, pending, &e);
        }
    }

    fn log_send_failure(delivery_id: DeliveryId, pending: &UnconfirmedDelivery, error: &ProcessError) {
        event!(Level::WARN, event = delivery::COMMAND_SEND_FAILED, delivery_id = %delivery_id,
               destination = pending.command.destination(), attempts = pending.attempts, error = %error);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        domain::action::{ProcessAction, ProcessStep},
        testkit::{Begin, RecordingEntity, SagaEvent, noop_sink}
    };

    fn outbound(entity: &Arc<RecordingEntity<Begin>>, attempt: u32) -> Box<dyn OutboundCommand> {
        let action: ProcessAction<SagaEvent> = ProcessAction::deliver(entity.entity_ref(), Begin { attempt });
        match action.into_steps().pop() {
            Some(ProcessStep::DeliverCommand(request)) => request.command,
            _ => panic!("expected a delivery step")
        }
    }

    fn settings(interval: Duration, burst: usize) -> DeliverySettings {
        DeliverySettings { redeliver_interval: interval, redelivery_burst_limit: burst, warn_after_attempts: 2 }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let entity = RecordingEntity::new("dest");
        let mut delivery = AtLeastOnceDelivery::new(DeliverySettings::default());
        let sink = noop_sink();

        assert_eq!(delivery.deliver(outbound(&entity, 1), Some(&sink)), DeliveryId::new(1));
        assert_eq!(delivery.deliver(outbound(&entity, 2), Some(&sink)), DeliveryId::new(2));
        assert_eq!(delivery.outstanding_unconfirmed(), 2);

        let sent = entity.deliveries();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, DeliveryId::new(2));
        assert_eq!(sent[1].1, Begin { attempt: 2 });
    }

    #[test]
    fn test_registration_without_sink_sends_nothing() {
        let entity = RecordingEntity::new("dest");
        let mut delivery = AtLeastOnceDelivery::new(DeliverySettings::default());

        let id = delivery.deliver(outbound(&entity, 1), None);

        assert!(entity.deliveries().is_empty());
        assert!(delivery.is_unconfirmed(id));
    }

    #[test]
    fn test_confirm_removes_once() {
        let entity = RecordingEntity::new("dest");
        let mut delivery = AtLeastOnceDelivery::new(DeliverySettings::default());
        let id = delivery.deliver(outbound(&entity, 1), Some(&noop_sink()));

        assert!(delivery.confirm(id));
        assert!(!delivery.confirm(id));
        assert!(!delivery.confirm(DeliveryId::new(99)));
        assert_eq!(delivery.outstanding_unconfirmed(), 0);
    }

    #[test]
    fn test_unsent_deliveries_are_overdue_immediately() {
        let entity = RecordingEntity::new("dest");
        let mut delivery = AtLeastOnceDelivery::new(settings(Duration::from_secs(3600), 10));
        let sink = noop_sink();

        let recovered = delivery.deliver(outbound(&entity, 1), None);
        let live = delivery.deliver(outbound(&entity, 2), Some(&sink));

        let resent = delivery.redeliver_overdue(Instant::now(), &sink);
        assert_eq!(resent, vec![recovered]);
        assert_eq!(entity.deliveries().len(), 2);
        assert!(delivery.is_unconfirmed(live));
    }

    #[test]
    fn test_redelivery_after_interval_respects_burst_limit() {
        let entity = RecordingEntity::new("dest");
        let mut delivery = AtLeastOnceDelivery::new(settings(Duration::from_millis(10), 2));
        let sink = noop_sink();

        for attempt in 1..=3 {
            delivery.deliver(outbound(&entity, attempt), Some(&sink));
        }

        let later = Instant::now() + Duration::from_secs(1);
        let first = delivery.redeliver_overdue(later, &sink);
        assert_eq!(first, vec![DeliveryId::new(1), DeliveryId::new(2)]);

        let second = delivery.redeliver_overdue(later, &sink);
        assert_eq!(second, vec![DeliveryId::new(3)]);
        assert_eq!(entity.deliveries().len(), 6);
    }

    #[test]
    fn test_failed_send_stays_unconfirmed() {
        let entity = RecordingEntity::new("dest");
        entity.set_unreachable(true);
        let mut delivery = AtLeastOnceDelivery::new(DeliverySettings::default());

        let id = delivery.deliver(outbound(&entity, 1), Some(&noop_sink()));

        assert!(entity.deliveries().is_empty());
        assert!(delivery.is_unconfirmed(id));
        assert_eq!(delivery.outstanding_unconfirmed(), 1);
    }
}
