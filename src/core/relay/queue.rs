//! Pending client messages awaiting upstream readiness.

use std::collections::VecDeque;

use super::base::RelayMessage;

/// FIFO buffer of raw client frames.
///
/// Unbounded: a client that keeps sending while the upstream never becomes
/// ready grows the queue until the session ends.
#[derive(Debug, Default)]
pub struct MessageQueue {
    entries: VecDeque<RelayMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame at the back.
    pub fn enqueue(&mut self, message: RelayMessage) {
        self.entries.push_back(message);
    }

    /// Remove and return every queued frame in insertion order.
    pub fn drain_all(&mut self) -> Vec<RelayMessage> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_insertion_order() {
        let mut queue = MessageQueue::new();
        queue.enqueue(RelayMessage::from(r#"{"type":"a"}"#));
        queue.enqueue(RelayMessage::from(r#"{"type":"b"}"#));
        queue.enqueue(RelayMessage::from(r#"{"type":"c"}"#));
        assert_eq!(queue.len(), 3);

        let drained = queue.drain_all();
        assert_eq!(
            drained,
            vec![
                RelayMessage::from(r#"{"type":"a"}"#),
                RelayMessage::from(r#"{"type":"b"}"#),
                RelayMessage::from(r#"{"type":"c"}"#),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_queue() {
        let mut queue = MessageQueue::new();
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_enqueue_after_drain() {
        let mut queue = MessageQueue::new();
        queue.enqueue(RelayMessage::from("first"));
        let _ = queue.drain_all();
        queue.enqueue(RelayMessage::from("second"));

        assert_eq!(queue.drain_all(), vec![RelayMessage::from("second")]);
    }
}
