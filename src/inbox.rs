//! An agent's pending-message inbox (§3 Data Model).
//!
//! Guarded by its own mutex, deliberately separate from the registry lock in
//! [`crate::manager::AgentManager`] so that delivering a message never has to
//! contend with whoever is reading or writing the agent table (the design
//! note behind invariant P-lock-ordering in spec.md §5).

use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO queue of formatted user-turn strings waiting to be folded into an
/// agent's transcript on its next loop iteration.
pub struct Inbox {
    queue: Mutex<VecDeque<String>>,
}

impl Inbox {
    pub fn new() -> Self {
        Inbox {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, message: String) {
        self.queue.lock().expect("inbox mutex poisoned").push_back(message);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().expect("inbox mutex poisoned").is_empty()
    }

    /// Atomically removes and returns every queued message, in arrival order.
    pub fn drain(&self) -> Vec<String> {
        self.queue
            .lock()
            .expect("inbox mutex poisoned")
            .drain(..)
            .collect()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}
