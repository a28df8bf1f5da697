//! Observability hook for the manager and agent loop.
//!
//! Grounded in the teacher's `EventHandler`/`AgentEvent` pattern
//! (`cloudllm::event`): a single trait with default no-op methods, wrapped in
//! `Arc<dyn CoreEventHandler>` and shared across every agent. This is purely
//! additive observability — nothing in §4.3's state machine depends on an
//! event handler being present.

use async_trait::async_trait;

use crate::status::AgentStatus;

/// Lifecycle and tool-dispatch events emitted by the manager and agent loop.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// An agent was registered and its loop task started.
    AgentLaunched { agent_id: String },
    /// An agent transitioned from one status to another.
    AgentStatusChanged {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
    },
    /// A tool call was dispatched within an agent's loop.
    ToolDispatched {
        agent_id: String,
        tool_name: String,
        iteration: u32,
    },
    /// An agent was torn down via `shutdown`.
    AgentShutdown { agent_id: String },
}

/// Observability seam. All methods default to a no-op so callers only
/// override what they care about.
#[async_trait]
pub trait CoreEventHandler: Send + Sync {
    async fn on_event(&self, _event: &CoreEvent) {}
}

/// A handler that drops every event. Used when no observer is configured.
pub struct NullEventHandler;

#[async_trait]
impl CoreEventHandler for NullEventHandler {}
