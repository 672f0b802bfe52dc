//! Order fulfilment saga used by the `demo` command
//!
//! An order reserves stock at the warehouse. An out-of-stock rejection closes
//! the order; a cancellation after a successful reservation releases the stock.

use std::{collections::HashMap, sync::Arc};

use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use crate::{
    adapter::entity::EntityEnvelope,
    domain::{
        action::{Behavior, ProcessAction, behavior},
        command::Command,
        constant::warehouse
    },
    port::{entity::EntityRef, process::ProcessDefinition}
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced { order_id: String, sku: String, quantity: u32 },
    PaymentCaptured { order_id: String },
    OrderCancelled { order_id: String }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WarehouseCommand {
    Reserve { order_id: String, sku: String, quantity: u32 },
    Release { order_id: String }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StockRejected {
    OutOfStock { available: u32 },
    UnknownSku
}

impl Command for WarehouseCommand {
    type Rejection = StockRejected;

    fn name(&self) -> &'static str {
        match self {
            WarehouseCommand::Reserve { .. } => "Reserve",
            WarehouseCommand::Release { .. } => "Release"
        }
    }
}

/// Process definition of the order saga
pub struct OrderSaga {
    warehouse: Arc<dyn EntityRef<WarehouseCommand>>
}

impl OrderSaga {
    pub fn new(warehouse: Arc<dyn EntityRef<WarehouseCommand>>) -> Self {
        Self { warehouse }
    }
}

impl ProcessDefinition for OrderSaga {
    type Event = OrderEvent;

    fn process_type(&self) -> &str {
        "order"
    }

    fn initial_behavior(&self) -> Behavior<OrderEvent> {
        awaiting_order(self.warehouse.clone())
    }
}

fn awaiting_order(warehouse: Arc<dyn EntityRef<WarehouseCommand>>) -> Behavior<OrderEvent> {
    behavior(move |event| match event {
        OrderEvent::OrderPlaced { order_id, sku, quantity } => {
            let reserve =
                WarehouseCommand::Reserve { order_id: order_id.clone(), sku: sku.clone(), quantity: *quantity };
            ProcessAction::become_behavior(reserved(warehouse.clone(), order_id.clone())).and(
                ProcessAction::deliver_command(warehouse.clone(), reserve, |_rejection| {
                    ProcessAction::become_behavior(closed())
                })
            )
        }
        _ => ProcessAction::DoNothing
    })
}

fn reserved(warehouse: Arc<dyn EntityRef<WarehouseCommand>>, order_id: String) -> Behavior<OrderEvent> {
    behavior(move |event| match event {
        OrderEvent::PaymentCaptured { .. } => ProcessAction::become_behavior(closed()),
        OrderEvent::OrderCancelled { .. } => ProcessAction::become_behavior(closed())
            .and(ProcessAction::deliver(warehouse.clone(), WarehouseCommand::Release { order_id: order_id.clone() })),
        OrderEvent::OrderPlaced { .. } => ProcessAction::DoNothing
    })
}

fn closed() -> Behavior<OrderEvent> {
    behavior(|_| ProcessAction::DoNothing)
}

/// Warehouse State
pub struct WarehouseState {
    stock:        HashMap<String, u32>,
    /// order_id -> (sku, quantity); makes repeated reservations idempotent
    reservations: HashMap<String, (String, u32)>
}

/// Warehouse Actor - in-process destination of the order saga
pub struct Warehouse;

#[async_trait::async_trait]
impl Actor for Warehouse {
    type Arguments = HashMap<String, u32>;
    type Msg = EntityEnvelope<WarehouseCommand>;
    type State = WarehouseState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        stock: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(WarehouseState { stock, reservations: HashMap::new() })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        let EntityEnvelope(delivery) = message;

        match delivery.command {
            WarehouseCommand::Reserve { order_id, sku, quantity } => {
                if state.reservations.contains_key(&order_id) {
                    delivery.reply_to.accept();
                    return Ok(());
                }

                let rejection = match state.stock.get(&sku) {
                    None => Some(StockRejected::UnknownSku),
                    Some(&available) if available < quantity => Some(StockRejected::OutOfStock { available }),
                    Some(_) => None
                };
                if let Some(rejection) = rejection {
                    event!(Level::DEBUG, event = warehouse::RESERVATION_REJECTED, order_id = %order_id,
                           rejection = ?rejection);
                    delivery.reply_to.reject(&rejection)?;
                    return Ok(());
                }

                *state.stock.entry(sku.clone()).or_default() -= quantity;
                event!(Level::DEBUG, event = warehouse::STOCK_RESERVED, order_id = %order_id, sku = %sku, quantity);
                state.reservations.insert(order_id, (sku, quantity));
                delivery.reply_to.accept();
            }
            WarehouseCommand::Release { order_id } => {
                if let Some((sku, quantity)) = state.reservations.remove(&order_id) {
                    event!(Level::DEBUG, event = warehouse::STOCK_RELEASED, order_id = %order_id, quantity);
                    *state.stock.entry(sku).or_default() += quantity;
                }
                delivery.reply_to.accept();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ractor::rpc::{CallResult, call};

    use super::*;
    use crate::{
        actor::{
            message::{OfficeMessage, ProcessMessage, ProcessSnapshot},
            office::{ProcessOffice, deliver_event}
        },
        adapter::{entity::ActorEntityRef, journal::InMemoryJournal},
        domain::message::{MessageId, PersistentMessage},
        port::journal::Journal,
        testkit::quiet_settings
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn settled_snapshot(office: &ActorRef<OfficeMessage<OrderEvent>>, key: &str) -> ProcessSnapshot {
        let lookup = call(office, |reply| OfficeMessage::<OrderEvent>::Lookup { process_key: key.to_string(), reply }, Some(TIMEOUT));
        let process = match lookup.await.unwrap() {
            CallResult::Success(Some(process)) => process,
            _ => panic!("process {} is not live", key)
        };

        tokio::time::timeout(TIMEOUT, async {
            loop {
                let inspect = call(&process, |reply| ProcessMessage::<OrderEvent>::Inspect { reply }, Some(TIMEOUT));
                let CallResult::Success(snapshot) = inspect.await.unwrap() else {
                    panic!("inspect failed")
                };
                if snapshot.outstanding_unconfirmed == 0 {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    async fn start(stock: u32) -> (ActorRef<OfficeMessage<OrderEvent>>, Arc<InMemoryJournal>) {
        let stock = HashMap::from([("widget".to_string(), stock)]);
        let (warehouse, _) = Actor::spawn(None, Warehouse, stock).await.unwrap();
        let saga = OrderSaga::new(Arc::new(ActorEntityRef::new("warehouse", warehouse)));
        let journal = Arc::new(InMemoryJournal::new());
        let (office, _) = ProcessOffice::spawn(Arc::new(saga), journal.clone(), quiet_settings()).await.unwrap();
        (office, journal)
    }

    async fn kinds(journal: &InMemoryJournal, persistence_id: &str) -> Vec<&'static str> {
        journal
            .replay(persistence_id, 1)
            .await
            .unwrap()
            .iter()
            .map(|entry| PersistentMessage::<OrderEvent>::decode(&entry.payload).unwrap().kind())
            .collect()
    }

    fn placed(order_id: &str, quantity: u32) -> OrderEvent {
        OrderEvent::OrderPlaced { order_id: order_id.to_string(), sku: "widget".to_string(), quantity }
    }

    #[tokio::test]
    async fn test_reservation_is_confirmed() {
        let (office, journal) = start(5).await;

        deliver_event(&office, "o1", MessageId::from("e1"), placed("o1", 2), TIMEOUT).await.unwrap();

        let snapshot = settled_snapshot(&office, "o1").await;
        assert_eq!(snapshot.persistence_id, "order:o1");
        assert!(snapshot.pending_deliveries.is_empty());
        assert_eq!(kinds(&journal, "order:o1").await, vec!["event_envelope", "command_accepted"]);
    }

    #[tokio::test]
    async fn test_out_of_stock_closes_the_order() {
        let (office, journal) = start(1).await;

        deliver_event(&office, "o1", MessageId::from("e1"), placed("o1", 3), TIMEOUT).await.unwrap();
        settled_snapshot(&office, "o1").await;

        // Closed: a cancellation no longer releases anything
        let cancelled = OrderEvent::OrderCancelled { order_id: "o1".to_string() };
        deliver_event(&office, "o1", MessageId::from("e2"), cancelled, TIMEOUT).await.unwrap();

        let snapshot = settled_snapshot(&office, "o1").await;
        assert_eq!(snapshot.processed_messages, 2);
        assert_eq!(kinds(&journal, "order:o1").await, vec!["event_envelope", "command_rejected", "event_envelope"]);
    }

    #[tokio::test]
    async fn test_cancellation_releases_reserved_stock() {
        let (office, journal) = start(2).await;

        deliver_event(&office, "o1", MessageId::from("e1"), placed("o1", 2), TIMEOUT).await.unwrap();
        settled_snapshot(&office, "o1").await;

        let cancelled = OrderEvent::OrderCancelled { order_id: "o1".to_string() };
        deliver_event(&office, "o1", MessageId::from("e2"), cancelled, TIMEOUT).await.unwrap();
        settled_snapshot(&office, "o1").await;

        // The released stock is reservable by another order
        deliver_event(&office, "o2", MessageId::from("e1"), placed("o2", 2), TIMEOUT).await.unwrap();
        settled_snapshot(&office, "o2").await;
        assert_eq!(kinds(&journal, "order:o2").await, vec!["event_envelope", "command_accepted"]);
        assert_eq!(kinds(&journal, "order:o1").await.len(), 4);
    }
}
