//! CLI command handlers

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use ractor::{Actor, ActorRef};
use tracing::{Level, event};

use crate::{
    actor::{
        message::{EventAck, OfficeMessage, ProcessSnapshot},
        office::{ProcessOffice, deliver_event, lookup_process, office_stats},
        process::inspect_process
    },
    adapter::entity::ActorEntityRef,
    config::{RuntimeConfig, get_config_file_path},
    demo::{OrderEvent, OrderSaga, Warehouse},
    domain::{constant::journal as journal_events, error::ProcessError, message::MessageId},
    port::journal::{Journal, JournalEntry}
};

const DEMO_SKU: &str = "widget";
const DEMO_STOCK: u32 = 5;

/// Place an order through the saga, replay the placement, and print what the journal holds
pub async fn run_demo(
    config: &RuntimeConfig,
    journal: Arc<dyn Journal>,
    key: &str,
    reject: bool,
    cancel: bool
) -> Result<(), ProcessError> {
    let timeout = config.process.call_timeout();

    let (warehouse, _) = Actor::spawn(None, Warehouse, HashMap::from([(DEMO_SKU.to_string(), DEMO_STOCK)])).await?;
    let saga = OrderSaga::new(Arc::new(ActorEntityRef::new("warehouse", warehouse.clone())));
    let (office, _) = ProcessOffice::spawn(Arc::new(saga), journal.clone(), config.process.clone()).await?;

    let quantity = if reject { DEMO_STOCK + 1 } else { 2 };
    let placed = OrderEvent::OrderPlaced { order_id: key.to_string(), sku: DEMO_SKU.to_string(), quantity };
    let placed_id = MessageId::from(format!("{}-placed", key));

    let ack = deliver_event(&office, key, placed_id.clone(), placed.clone(), timeout).await?;
    print_ack(&ack);

    // The same inbound message again, as an at-least-once producer would resend it
    let ack = deliver_event(&office, key, placed_id, placed, timeout).await?;
    print_ack(&ack);

    if cancel {
        let cancelled = OrderEvent::OrderCancelled { order_id: key.to_string() };
        let ack = deliver_event(&office, key, MessageId::generate(), cancelled, timeout).await?;
        print_ack(&ack);
    }

    let snapshot = wait_until_settled(&office, key, timeout).await?;
    print_snapshot(&snapshot);

    let stats = office_stats(&office, timeout).await?;
    println!(
        "office: {} active, {} spawned, {} events routed",
        stats.active_processes, stats.total_spawned, stats.events_routed
    );

    println!();
    replay_journal(journal.as_ref(), &snapshot.persistence_id).await?;

    office
        .stop_and_wait(None, Some(timeout))
        .await
        .map_err(|e| ProcessError::Messaging(format!("Failed to stop the office: {}", e)))?;
    warehouse.stop(None);

    Ok(())
}

/// Poll the process until no delivery is outstanding
async fn wait_until_settled(
    office: &ActorRef<OfficeMessage<OrderEvent>>,
    key: &str,
    timeout: Duration
) -> Result<ProcessSnapshot, ProcessError> {
    let process = lookup_process(office, key, timeout)
        .await?
        .ok_or_else(|| ProcessError::Generic(format!("Process '{}' is not live", key)))?;

    let settle = async {
        loop {
            let snapshot = inspect_process(&process, timeout).await?;
            if snapshot.outstanding_unconfirmed == 0 {
                return Ok::<_, ProcessError>(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    };

    tokio::time::timeout(timeout, settle)
        .await
        .map_err(|_| ProcessError::Timeout(format!("Process '{}' still has unconfirmed deliveries", key)))?
}

fn print_ack(ack: &EventAck) {
    match ack {
        EventAck::Processed { sequence_nr, .. } => {
            println!("{}: processed (sequence_nr {})", ack.message_id(), sequence_nr)
        }
        EventAck::Duplicate { .. } => println!("{}: duplicate, ignored", ack.message_id())
    }
}

fn print_snapshot(snapshot: &ProcessSnapshot) {
    println!(
        "{}: last_sequence_nr {}, {} processed messages, {} unconfirmed deliveries",
        snapshot.persistence_id,
        snapshot.last_sequence_nr,
        snapshot.processed_messages,
        snapshot.outstanding_unconfirmed
    );
}

/// Print every persistence id with its highest sequence number
pub async fn list_journal(journal: &dyn Journal) -> Result<(), ProcessError> {
    let ids = journal.persistence_ids().await?;
    if ids.is_empty() {
        println!("journal is empty");
        return Ok(());
    }

    for persistence_id in ids {
        let highest = journal.highest_sequence_nr(&persistence_id).await?;
        println!("{:<40} {:>8}", persistence_id, highest);
    }
    Ok(())
}

/// Print every record of `persistence_id` in append order
pub async fn replay_journal(journal: &dyn Journal, persistence_id: &str) -> Result<(), ProcessError> {
    let entries = journal.replay(persistence_id, 1).await?;
    event!(Level::DEBUG, event = journal_events::ENTRIES_REPLAYED, persistence_id = %persistence_id,
           count = entries.len());

    if entries.is_empty() {
        println!("no records for '{}'", persistence_id);
        return Ok(());
    }

    for entry in &entries {
        println!("{}", describe_entry(entry));
    }
    Ok(())
}

/// One journal line; records are JSON whatever the event type is
fn describe_entry(entry: &JournalEntry) -> String {
    let record = match serde_json::from_slice::<serde_json::Value>(&entry.payload) {
        Ok(value) => value.to_string(),
        Err(_) => format!("<{} unreadable bytes>", entry.payload.len())
    };
    format!("{:>6}  {}  {}", entry.sequence_nr, entry.recorded_at.format("%Y-%m-%d %H:%M:%S%.3f"), record)
}

/// Print where the config is read from and its effective values
pub fn show_config(config: &RuntimeConfig, explicit_path: Option<&Path>) -> Result<(), ProcessError> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => get_config_file_path().map_err(|e| ProcessError::Configuration(e.to_string()))?
    };
    let yaml = config.to_yaml().map_err(|e| ProcessError::Configuration(e.to_string()))?;

    println!("# {}", path.display());
    print!("{}", yaml);
    Ok(())
}
