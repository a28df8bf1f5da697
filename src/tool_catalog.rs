//! The declarative tool catalog (C8) exposed to every agent's chat-service
//! requests.
//!
//! Purely descriptive — schemas only. Dispatch logic lives in
//! [`crate::agent_loop`]. Grounded in the teacher's `ToolMetadata`/
//! `ToolRegistry` split (`tool_protocol.rs`): tool *declaration* and tool
//! *execution* are different concerns, kept in different modules.

use serde_json::json;

use crate::chat::ToolSchema;

/// The fixed names of the seven tools an agent may call (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CompleteTask,
    SetStatus,
    ListAgents,
    BroadcastMessage,
    SendMessage,
    ExecuteCommand,
    BrowseWeb,
}

impl ToolName {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::CompleteTask => "complete_task",
            ToolName::SetStatus => "set_status",
            ToolName::ListAgents => "list_agents",
            ToolName::BroadcastMessage => "broadcast_message",
            ToolName::SendMessage => "send_message",
            ToolName::ExecuteCommand => "execute_command",
            ToolName::BrowseWeb => "browse_web",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "complete_task" => Some(ToolName::CompleteTask),
            "set_status" => Some(ToolName::SetStatus),
            "list_agents" => Some(ToolName::ListAgents),
            "broadcast_message" => Some(ToolName::BroadcastMessage),
            "send_message" => Some(ToolName::SendMessage),
            "execute_command" => Some(ToolName::ExecuteCommand),
            "browse_web" => Some(ToolName::BrowseWeb),
            _ => None,
        }
    }
}

/// Returns the full catalog, in the fixed order §4.4 specifies.
pub fn catalog() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: ToolName::CompleteTask.as_str().to_string(),
            description: "Signal that the agent's task is finished. Terminal.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolSchema {
            name: ToolName::SetStatus.as_str().to_string(),
            description: "Request to pause until new input arrives.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["waiting-for-input"],
                    },
                },
                "required": ["status"],
            }),
        },
        ToolSchema {
            name: ToolName::ListAgents.as_str().to_string(),
            description: "List every other known agent and its status.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolSchema {
            name: ToolName::BroadcastMessage.as_str().to_string(),
            description: "Deliver a message to every other agent's inbox.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                },
                "required": ["message"],
            }),
        },
        ToolSchema {
            name: ToolName::SendMessage.as_str().to_string(),
            description: "Deliver a message to one specific agent's inbox.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "recipient_id": {"type": "string"},
                    "message": {"type": "string"},
                },
                "required": ["recipient_id", "message"],
            }),
        },
        ToolSchema {
            name: ToolName::ExecuteCommand.as_str().to_string(),
            description: "Run a shell command in this agent's sandbox.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                },
                "required": ["command"],
            }),
        },
        ToolSchema {
            name: ToolName::BrowseWeb.as_str().to_string(),
            description: "Fetch a URL and extract its cleaned main text.".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                },
                "required": ["url"],
            }),
        },
    ]
}
