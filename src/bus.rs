//! The in-process publish/subscribe substrate (C4) underlying the messaging
//! tools (`broadcast_message`, `send_message`).
//!
//! One bus-level mutex guards subscriptions and per-recipient pending queues,
//! mirroring the teacher's preference for a single `std::sync::Mutex`-guarded
//! map over sharded locking (`tools::bash::BashTool` keeps its settings behind
//! one lock for the same reason: the critical sections are tiny). The bus
//! never wakes an agent; that stays the [`crate::manager::AgentManager`]'s
//! responsibility, which drains a recipient's queue into its actual inbox and
//! decides whether to start a loop task.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// One published message.
#[derive(Debug, Clone)]
pub struct Message {
    pub from: String,
    pub topic: String,
    pub content: String,
}

#[derive(Default)]
struct BusState {
    subscriptions: HashMap<String, HashSet<String>>,
    pending: HashMap<String, VecDeque<Message>>,
}

/// The shared pub/sub bus. Cheap to construct, intended to be wrapped in an
/// `Arc` and shared across the manager and every agent loop task.
pub struct MessageBus {
    state: Mutex<BusState>,
}

impl MessageBus {
    pub fn new() -> Self {
        MessageBus {
            state: Mutex::new(BusState::default()),
        }
    }

    /// Subscribes `identity` to `topic`. Idempotent.
    pub fn subscribe(&self, identity: &str, topic: &str) {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        state
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .insert(identity.to_string());
    }

    /// Removes every subscription held by `identity`, across all topics.
    pub fn unsubscribe_all(&self, identity: &str) {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        for subscribers in state.subscriptions.values_mut() {
            subscribers.remove(identity);
        }
        state.pending.remove(identity);
    }

    /// Delivers `message` to every identity currently subscribed to its
    /// topic, except the sender itself. Returns the number of recipients the
    /// message was queued for.
    pub fn publish(&self, message: Message) -> usize {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        let recipients: Vec<String> = state
            .subscriptions
            .get(&message.topic)
            .into_iter()
            .flatten()
            .filter(|id| **id != message.from)
            .cloned()
            .collect();
        for recipient in &recipients {
            state
                .pending
                .entry(recipient.clone())
                .or_default()
                .push_back(message.clone());
        }
        recipients.len()
    }

    /// Removes and returns every message queued for `identity`, in arrival order.
    pub fn drain(&self, identity: &str) -> Vec<Message> {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        state
            .pending
            .get_mut(identity)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_excludes_sender_and_non_subscribers() {
        let bus = MessageBus::new();
        bus.subscribe("a", "broadcast");
        bus.subscribe("b", "broadcast");
        // "c" never subscribes.
        let delivered = bus.publish(Message {
            from: "a".into(),
            topic: "broadcast".into(),
            content: "hello".into(),
        });
        assert_eq!(delivered, 1);
        assert!(bus.drain("a").is_empty());
        assert_eq!(bus.drain("b").len(), 1);
        assert!(bus.drain("c").is_empty());
    }

    #[test]
    fn drain_is_fifo_and_empties_the_queue() {
        let bus = MessageBus::new();
        bus.subscribe("b", "broadcast");
        for i in 0..3 {
            bus.publish(Message {
                from: "a".into(),
                topic: "broadcast".into(),
                content: format!("msg-{i}"),
            });
        }
        let drained = bus.drain("b");
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].content, "msg-0");
        assert_eq!(drained[2].content, "msg-2");
        assert!(bus.drain("b").is_empty());
    }

    #[test]
    fn unsubscribe_all_stops_future_delivery() {
        let bus = MessageBus::new();
        bus.subscribe("b", "broadcast");
        bus.unsubscribe_all("b");
        bus.publish(Message {
            from: "a".into(),
            topic: "broadcast".into(),
            content: "hello".into(),
        });
        assert!(bus.drain("b").is_empty());
    }
}
