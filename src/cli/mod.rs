pub mod args;
pub mod commands;

pub use args::{JournalCommands, SagaCli, SagaCommand};
