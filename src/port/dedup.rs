use crate::domain::message::MessageId;

/// Deduplication oracle for inbound event messages
///
/// Implementations are owned by one process instance and rebuilt from the
/// same journal during recovery, so they stay consistent with it.
pub trait Deduplication: Send + 'static {
    /// Whether `message_id` was already processed by this instance
    fn has_processed(&self, message_id: &MessageId) -> bool;

    /// Record `message_id` as processed
    fn mark_processed(&mut self, message_id: MessageId);

    /// Number of remembered message ids
    fn processed_count(&self) -> usize;
}
