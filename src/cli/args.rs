//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapter::journal::JournalType;

#[derive(Parser, Debug)]
#[command(name = "saga", author, version, about = "Persistent process manager runtime", long_about = None)]
#[command(propagate_version = true)]
pub struct SagaCli {
    /// Path to the runtime config file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the configured journal backend
    #[arg(long, global = true, value_enum)]
    pub journal: Option<JournalType>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: SagaCommand
}

#[derive(Subcommand, Debug)]
pub enum SagaCommand {
    /// Run the order fulfilment saga against an in-process warehouse
    Demo {
        /// Order id, also the process key
        #[arg(long, default_value = "order-1")]
        key:    String,
        /// Order more than the warehouse holds so the reservation is rejected
        #[arg(long)]
        reject: bool,
        /// Cancel the order after it was placed
        #[arg(long)]
        cancel: bool
    },
    /// Inspect the journal
    Journal {
        #[command(subcommand)]
        command: JournalCommands
    },
    /// Print the effective configuration
    Config
}

#[derive(Subcommand, Debug)]
pub enum JournalCommands {
    /// List persistence ids with their highest sequence number
    List,
    /// Print every record of one persistence id
    Replay {
        /// Persistence id, e.g. `order:order-1`
        persistence_id: String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo_flags() {
        let cli = SagaCli::parse_from(["saga", "--journal", "rocksdb", "demo", "--key", "o7", "--reject"]);

        assert_eq!(cli.journal, Some(JournalType::RocksDb));
        match cli.command {
            SagaCommand::Demo { key, reject, cancel } => {
                assert_eq!(key, "o7");
                assert!(reject);
                assert!(!cancel);
            }
            other => panic!("unexpected command: {:?}", other)
        }
    }

    #[test]
    fn test_parse_journal_replay() {
        let cli = SagaCli::parse_from(["saga", "journal", "replay", "order:o1", "-v"]);

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            SagaCommand::Journal { command: JournalCommands::Replay { persistence_id } } if persistence_id == "order:o1"
        ));
    }
}
