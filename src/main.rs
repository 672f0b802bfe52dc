//! # Saga CLI
//!
//! Runs the order fulfilment demo and inspects the process journal.
//!
//! ```bash
//! # Place an order; the warehouse accepts the reservation
//! saga demo --key order-1
//!
//! # Same with a rejected reservation, journaled to RocksDB
//! saga --journal rocksdb demo --key order-2 --reject
//!
//! # Inspect what was journaled
//! saga --journal rocksdb journal list
//! saga --journal rocksdb journal replay order:order-2
//! ```

use clap::Parser;
use saga::{
    JournalFactory, JournalType, ProcessError, RuntimeConfig,
    cli::{
        JournalCommands, SagaCli, SagaCommand,
        commands::{list_journal, replay_journal, run_demo, show_config}
    }
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ProcessError> {
    let cli = SagaCli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("saga=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut config = RuntimeConfig::load(cli.config.as_deref())
        .map_err(|e| ProcessError::Configuration(format!("{:#}", e)))?;
    if let Some(journal) = cli.journal {
        config.journal = journal;
    }

    if let SagaCommand::Config = cli.command {
        return show_config(&config, cli.config.as_deref());
    }

    let database_path = match config.journal {
        JournalType::RocksDb => {
            let path = config.resolved_database_path().map_err(|e| ProcessError::Configuration(e.to_string()))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(path)
        }
        JournalType::InMemory => None
    };
    let journal = JournalFactory::create(config.journal, database_path)?;

    match cli.command {
        SagaCommand::Demo { key, reject, cancel } => run_demo(&config, journal, &key, reject, cancel).await,
        SagaCommand::Journal { command: JournalCommands::List } => list_journal(journal.as_ref()).await,
        SagaCommand::Journal { command: JournalCommands::Replay { persistence_id } } => {
            replay_journal(journal.as_ref(), &persistence_id).await
        }
        SagaCommand::Config => Ok(())
    }
}
