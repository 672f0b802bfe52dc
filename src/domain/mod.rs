pub mod action;
pub mod command;
pub mod constant;
pub mod error;
pub mod message;
