//! Actor-based process manager runtime
//!
//! Each process instance is a ractor actor that journals every record before
//! applying it; an office per process type routes events to instances by key.

pub mod delivery;
pub mod message;
pub mod office;
pub mod process;

pub use delivery::*;
pub use message::*;
pub use office::*;
pub use process::*;
