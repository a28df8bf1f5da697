//! The per-agent conversation transcript (§3 Data Model).
//!
//! A `Transcript` is the ordered list of turns an agent has seen and produced:
//! the seed system/user turns, assistant turns (possibly carrying tool calls),
//! and the tool-result turns fed back in response. The loop (`agent_loop.rs`)
//! is the only writer; external callers only ever read a cloned snapshot.

use serde::{Deserialize, Serialize};

use crate::chat::ToolCallRequest;

/// One entry in an agent's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Turn {
    /// The system prompt the agent was launched with.
    System(String),
    /// A user turn: the seed prompt, an `instruct`, or a delivered message.
    User(String),
    /// An assistant turn, possibly requesting one or more tool calls.
    Assistant {
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// The result of executing a single tool call, correlated by `call_id`.
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },
    /// A terminal agent-level failure (budget exhaustion, unrecoverable error).
    Failure(String),
}

/// The full ordered history of turns for one agent.
pub type Transcript = Vec<Turn>;
