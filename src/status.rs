//! Agent status enum.
//!
//! Mirrors the state machine driven by the agent loop (see [`crate::agent_loop`]).
//! Transitions are documented on the loop itself; this module only carries the
//! tag and the one piece of logic every caller needs: whether a status is terminal.

use std::fmt;

/// The lifecycle state of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    /// Record created, sandbox being allocated, loop task not started yet.
    Initializing,
    /// A loop task is actively cycling through think-act-observe iterations.
    Running,
    /// No loop task is active; the agent is parked until new input arrives.
    WaitingForInput,
    /// Terminal: the agent called `complete_task`.
    Completed,
    /// Terminal: iteration budget exhausted, or an unrecoverable error occurred.
    Failed,
}

impl AgentStatus {
    /// `true` for `Completed` and `Failed` — states that never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Initializing => "initializing",
            AgentStatus::Running => "running",
            AgentStatus::WaitingForInput => "waiting-for-input",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
