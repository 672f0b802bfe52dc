//! Deduplication backed by the process journal
//!
//! The set is never written anywhere on its own: every `EventEnvelope` replayed
//! during recovery marks its message id again, so after recovery the set is
//! exactly the ids present in the journal.

use std::collections::HashSet;

use crate::{domain::message::MessageId, port::dedup::Deduplication};

/// In-memory set of processed message ids
#[derive(Debug, Default)]
pub struct ProcessedMessages {
    seen: HashSet<MessageId>
}

impl ProcessedMessages {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }
}

impl Deduplication for ProcessedMessages {
    fn has_processed(&self, message_id: &MessageId) -> bool {
        self.seen.contains(message_id)
    }

    fn mark_processed(&mut self, message_id: MessageId) {
        self.seen.insert(message_id);
    }

    fn processed_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_are_idempotent() {
        let mut processed = ProcessedMessages::new();
        let id = MessageId::from("m1");

        assert!(!processed.has_processed(&id));
        processed.mark_processed(id.clone());
        processed.mark_processed(id.clone());

        assert!(processed.has_processed(&id));
        assert!(!processed.has_processed(&MessageId::from("m2")));
        assert_eq!(processed.processed_count(), 1);
    }
}
