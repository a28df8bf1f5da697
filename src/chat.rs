//! The chat-service contract (C3): the one seam between the core and whatever
//! remote LLM backend a caller plugs in.
//!
//! Grounded in the teacher's [`ClientWrapper`] trait
//! (`cloudllm::client_wrapper`): a `Send + Sync` async trait object, messages
//! carrying native tool calls, and a manual `Display`/`Error` pair instead of
//! `thiserror`. Unlike the teacher, this crate has no per-provider clients —
//! callers bring their own `ChatService` impl that talks to whatever backend
//! they like; the core only ever sees this trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transcript::Turn;

/// A single tool call the assistant asked the core to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque id used to correlate the eventual `ToolResult` turn.
    pub id: String,
    /// Name of the tool being invoked; must match an entry in `tool_catalog`.
    pub name: String,
    /// Parsed JSON arguments supplied by the assistant.
    pub arguments: Value,
}

/// Declares one callable tool to the chat service, mirroring the teacher's
/// `ToolDefinition`.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// One completion request: system prompt, transcript so far, available tools.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub transcript: Vec<Turn>,
    pub tools: Vec<ToolSchema>,
    pub temperature: f32,
}

/// The assistant's reply: free text plus zero or more tool calls.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Failure returned by a [`ChatService`] implementation.
#[derive(Debug, Clone)]
pub enum ChatError {
    /// The request never reached the backend (network, timeout, auth).
    Transport(String),
    /// The backend reached, but rejected or failed to answer the request.
    Provider(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Transport(msg) => write!(f, "chat transport error: {msg}"),
            ChatError::Provider(msg) => write!(f, "chat provider error: {msg}"),
        }
    }
}

impl std::error::Error for ChatError {}

/// The remote chat-service seam (C3). Implementations must be safe to share
/// across agent loop tasks.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Produce the next assistant turn for a given request.
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, ChatError>;
}
