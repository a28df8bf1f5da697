//! Crate-wide error taxonomy.
//!
//! Follows the teacher crate's manual `Display`/`Error` style (see
//! `tool_protocol::ToolError`, `tools::bash::BashError`) rather than pulling in
//! `thiserror`: the root crate doesn't depend on it, so neither do we.

use std::fmt;

use crate::sandbox::SandboxError;

/// The error surface every external operation (C9) and manager method (C7) returns.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// No agent is registered under the given identity.
    UnknownAgent(String),
    /// `launch` was called with an identity already present in the registry.
    DuplicateAgent(String),
    /// The sandbox driver could not allocate or reach a sandbox.
    SandboxUnavailable(String),
    /// The chat service returned a transport or provider-level failure.
    ChatServiceError(String),
    /// A caller supplied malformed or missing arguments.
    InvalidArguments(String),
    /// An agent's iteration budget was exhausted before it completed.
    BudgetExhausted(String),
    /// An invariant was violated; this should not happen in correct operation.
    InternalError(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::UnknownAgent(id) => write!(f, "unknown agent: {id}"),
            CoreError::DuplicateAgent(id) => write!(f, "duplicate agent: {id}"),
            CoreError::SandboxUnavailable(msg) => write!(f, "sandbox unavailable: {msg}"),
            CoreError::ChatServiceError(msg) => write!(f, "chat service error: {msg}"),
            CoreError::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            CoreError::BudgetExhausted(id) => write!(f, "iteration budget exhausted: {id}"),
            CoreError::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<SandboxError> for CoreError {
    fn from(err: SandboxError) -> Self {
        CoreError::SandboxUnavailable(err.to_string())
    }
}

impl From<crate::chat::ChatError> for CoreError {
    fn from(err: crate::chat::ChatError) -> Self {
        CoreError::ChatServiceError(err.to_string())
    }
}
