use crate::domain::{
    command::{Command, CommandDelivery},
    error::ProcessError
};

/// Reference to a destination entity that accepts commands of type `C`
///
/// `tell` must not block: it hands the delivery to the destination's transport
/// and returns. The destination answers through `delivery.reply_to`, possibly
/// more than once when the same delivery is retried.
pub trait EntityRef<C: Command>: Send + Sync + 'static {
    /// Stable address of the destination, used in logs
    fn address(&self) -> &str;

    /// Hand one delivery attempt to the destination
    fn tell(&self, delivery: CommandDelivery<C>) -> Result<(), ProcessError>;
}
