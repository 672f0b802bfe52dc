//! Domain Events - Structured events for internal monitoring and debugging

/// ProcessOffice Actor Events
pub mod office {
    pub const OFFICE_STARTED: &str = "office.started";
    pub const EVENT_ROUTED: &str = "event.routed";
    pub const PROCESS_SPAWNED: &str = "process.spawned";
    pub const PROCESS_SPAWN_FAILED: &str = "process.spawn_failed";
    pub const PROCESS_PASSIVATED: &str = "process.passivated";
    pub const PROCESS_TERMINATED: &str = "process.terminated";
    pub const PROCESS_FAILED: &str = "process.failed";
    pub const OFFICE_STOPPED: &str = "office.stopped";
}

/// ProcessActor Events
pub mod process {
    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_STOPPED: &str = "process.stopped";
    pub const RECOVERY_STARTED: &str = "recovery.started";
    pub const RECOVERY_COMPLETED: &str = "recovery.completed";
    pub const RECOVERY_FAILED: &str = "recovery.failed";
    pub const EVENT_RECEIVED: &str = "event.received";
    pub const EVENT_DUPLICATE: &str = "event.duplicate";
    pub const EVENT_PROCESSED: &str = "event.processed";
    pub const RECORD_PERSISTED: &str = "record.persisted";
    pub const RECORD_PERSIST_FAILED: &str = "record.persist_failed";
    pub const BEHAVIOR_CHANGED: &str = "behavior.changed";
    pub const COMMAND_ACCEPTED: &str = "command.accepted";
    pub const COMMAND_REJECTED: &str = "command.rejected";
    pub const REJECTION_UNHANDLED: &str = "rejection.unhandled";
    pub const OUTCOME_UNKNOWN_DELIVERY: &str = "outcome.unknown_delivery";
    pub const REPLAY_ORDERING_VIOLATION: &str = "replay.ordering_violation";
    pub const PASSIVATION_REQUESTED: &str = "passivation.requested";
    pub const PASSIVATION_DEFERRED: &str = "passivation.deferred";
    pub const ACK_FAILED: &str = "ack.failed";
}

/// At-least-once delivery Events
pub mod delivery {
    pub const COMMAND_DELIVERED: &str = "command.delivered";
    pub const COMMAND_REGISTERED: &str = "command.registered";
    pub const COMMAND_REDELIVERED: &str = "command.redelivered";
    pub const COMMAND_SEND_FAILED: &str = "command.send_failed";
    pub const DELIVERY_CONFIRMED: &str = "delivery.confirmed";
    pub const UNCONFIRMED_WARNING: &str = "delivery.unconfirmed_warning";
}

/// Journal Events
pub mod journal {
    pub const JOURNAL_OPENED: &str = "journal.opened";
    pub const ENTRY_APPENDED: &str = "entry.appended";
    pub const ENTRIES_REPLAYED: &str = "entries.replayed";
    pub const STORAGE_FAILED: &str = "storage.failed";
}

/// Demo Warehouse Events
pub mod warehouse {
    pub const STOCK_RESERVED: &str = "stock.reserved";
    pub const STOCK_RELEASED: &str = "stock.released";
    pub const RESERVATION_REJECTED: &str = "reservation.rejected";
}
