use std::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::action::Behavior;

/// Definition of a process manager type
///
/// The initial behavior is fixed for the type: recovery always starts from it
/// and replays the journal on top, so it must not depend on anything but the
/// definition itself.
pub trait ProcessDefinition: Send + Sync + 'static {
    /// Domain events the process reacts to; journaled inside `EventEnvelope`
    type Event: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Process type name, the prefix of every persistence id of this type
    ///
    /// Must not contain `:`; everything after the first `:` of a persistence
    /// id is the process key.
    fn process_type(&self) -> &str;

    /// Behavior every instance starts from
    fn initial_behavior(&self) -> Behavior<Self::Event>;

    /// Stable journal partition name for the instance keyed by `process_key`
    fn persistence_id(&self, process_key: &str) -> String {
        format!("{}:{}", self.process_type(), process_key)
    }
}
