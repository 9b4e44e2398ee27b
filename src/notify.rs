//! Notification delivery seam
//!
//! The engine announces new orders, new claims, and confirmations, but
//! delivery is strictly best-effort: a sink that fails must log and swallow,
//! never fail or delay a ledger operation. Transport-specific senders live
//! outside this crate and implement [`NotificationSink`].

use crate::types::ClientId;
use parking_lot::Mutex;

/// Best-effort notification delivery
///
/// Implementations must not panic and must not block for long; the engine
/// calls `notify` inline after a write has already been made durable.
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `recipient`, best-effort
    fn notify(&self, recipient: ClientId, text: &str);
}

/// Sink that only logs the notification
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, recipient: ClientId, text: &str) {
        tracing::info!(recipient = %recipient, text, "Notification");
    }
}

/// Sink that buffers notifications in memory
///
/// Useful for the demo binary and for asserting delivery in tests.
#[derive(Debug, Default)]
pub struct BufferedSink {
    messages: Mutex<Vec<(ClientId, String)>>,
}

impl BufferedSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of buffered notifications, in delivery order
    pub fn messages(&self) -> Vec<(ClientId, String)> {
        self.messages.lock().clone()
    }

    /// Messages addressed to one recipient
    pub fn messages_for(&self, recipient: ClientId) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl NotificationSink for BufferedSink {
    fn notify(&self, recipient: ClientId, text: &str) {
        self.messages.lock().push((recipient, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_sink_records_in_order() {
        let sink = BufferedSink::new();
        sink.notify(ClientId::new(1), "first");
        sink.notify(ClientId::new(2), "second");
        sink.notify(ClientId::new(1), "third");

        assert_eq!(sink.messages().len(), 3);
        assert_eq!(
            sink.messages_for(ClientId::new(1)),
            vec!["first".to_string(), "third".to_string()]
        );
    }
}
