//! Serialises user/reminder ingestion into the agent loop (§4.5).

use agent_protocol::message::{ContentBlock, Message, Role};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Reminder,
}

pub struct SendOptions {
    pub kind: MessageKind,
    pub reminder: Option<String>,
    pub skip_standard_ending: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            kind: MessageKind::User,
            reminder: None,
            skip_standard_ending: false,
        }
    }
}

/// Queues user/reminder text as `Message`s ready for the next `runStep` to
/// pick up. `flush()` is a no-op: message order is already insertion order.
pub struct MessageQueue {
    pending: Mutex<Vec<Message>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Wraps reminders in `<system-reminder>...</system-reminder>` (unless
    /// `skip_standard_ending` is set) and appends a user-role message with a
    /// single text block.
    pub fn send(&self, text: &str, opts: SendOptions) -> Uuid {
        let body = match opts.kind {
            MessageKind::User => text.to_string(),
            MessageKind::Reminder if opts.skip_standard_ending => text.to_string(),
            MessageKind::Reminder => format!("<system-reminder>{text}</system-reminder>"),
        };
        let message = Message::new(Role::User, vec![ContentBlock::Text { text: body }]);
        let id = message.id;
        self.pending.lock().push(message);
        id
    }

    /// No-op: present for API parity with batching-capable implementations.
    pub fn flush(&self) {}

    /// Drains every queued message in insertion order.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut self.pending.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminders_are_wrapped_unless_skipped() {
        let queue = MessageQueue::new();
        queue.send(
            "check todos",
            SendOptions {
                kind: MessageKind::Reminder,
                reminder: None,
                skip_standard_ending: false,
            },
        );
        let drained = queue.drain();
        let ContentBlock::Text { text } = &drained[0].content[0] else {
            panic!("expected text block");
        };
        assert_eq!(text, "<system-reminder>check todos</system-reminder>");
    }

    #[test]
    fn drain_returns_insertion_order() {
        let queue = MessageQueue::new();
        queue.send("first", SendOptions::default());
        queue.send("second", SendOptions::default());
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
