//! The external tool surface (C9): the outward-facing envelope an external
//! caller uses to drive the manager.
//!
//! Mirrors the "call-a-tool" shape used throughout the teacher crate's tool
//! protocol (`tool_protocol::ToolProtocol::execute`): a name, a JSON argument
//! map, and a uniform `{content, is-error}` result rather than a raw
//! `Result<T, E>` — callers across a process boundary need the error folded
//! into the payload, not a native Rust error type.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::CoreError;
use crate::manager::AgentManager;

/// The uniform result of one external tool call (§6).
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolCallResult {
    fn ok(text: impl Into<String>) -> Self {
        ToolCallResult {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        ToolCallResult {
            text: text.into(),
            is_error: true,
        }
    }

    fn from_core_error(err: CoreError) -> Self {
        ToolCallResult::error(err.to_string())
    }
}

/// Dispatches one external tool call by name. Unknown names come back as a
/// tool-result error rather than a Rust-level error, matching the rest of
/// the taxonomy in §7 ("user-input errors ... returned as a tool-result
/// error to the caller").
pub async fn call_tool(manager: &Arc<AgentManager>, name: &str, arguments: &Value) -> ToolCallResult {
    match name {
        "launchAgent" => launch_agent(manager, arguments).await,
        "listAgents" => list_agents(manager).await,
        "getAgentStatus" => get_agent_status(manager, arguments).await,
        "instructAgent" => instruct_agent(manager, arguments).await,
        "shutdownAgent" => shutdown_agent(manager, arguments).await,
        "bulkManageAgents" => bulk_manage_agents(manager, arguments).await,
        other => ToolCallResult::error(format!("unknown external tool: {other}")),
    }
}

async fn launch_agent(manager: &Arc<AgentManager>, arguments: &Value) -> ToolCallResult {
    let (Some(system_prompt), Some(user_prompt), Some(temperature)) = (
        arguments.get("system_prompt").and_then(Value::as_str),
        arguments.get("user_prompt").and_then(Value::as_str),
        arguments.get("temperature").and_then(Value::as_f64),
    ) else {
        return ToolCallResult::error(
            "invalid-arguments: launchAgent requires system_prompt, user_prompt, temperature",
        );
    };
    let iteration_budget = arguments
        .get("iteration_budget")
        .and_then(Value::as_u64)
        .map(|n| n as u32);

    match manager
        .launch(
            system_prompt.to_string(),
            user_prompt.to_string(),
            temperature as f32,
            iteration_budget,
        )
        .await
    {
        Ok(id) => ToolCallResult::ok(json!({ "id": id }).to_string()),
        Err(err) => ToolCallResult::from_core_error(err),
    }
}

async fn list_agents(manager: &Arc<AgentManager>) -> ToolCallResult {
    let summaries = manager.list().await;
    let entries: Vec<Value> = summaries
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "status": s.status.to_string(),
                "result": s.result,
                "created_at": s.created_at.to_rfc3339(),
            })
        })
        .collect();
    ToolCallResult::ok(Value::Array(entries).to_string())
}

async fn get_agent_status(manager: &Arc<AgentManager>, arguments: &Value) -> ToolCallResult {
    let Some(agent_id) = arguments.get("agent_id").and_then(Value::as_str) else {
        return ToolCallResult::error("invalid-arguments: getAgentStatus requires agent_id");
    };
    match manager.status(agent_id).await {
        Ok(detail) => ToolCallResult::ok(
            json!({
                "id": detail.id,
                "status": detail.status.to_string(),
                "result": detail.result,
                "messages": detail.messages,
                "created_at": detail.created_at.to_rfc3339(),
            })
            .to_string(),
        ),
        Err(err) => ToolCallResult::from_core_error(err),
    }
}

async fn instruct_agent(manager: &Arc<AgentManager>, arguments: &Value) -> ToolCallResult {
    let (Some(agent_id), Some(prompt)) = (
        arguments.get("agent_id").and_then(Value::as_str),
        arguments.get("prompt").and_then(Value::as_str),
    ) else {
        return ToolCallResult::error("invalid-arguments: instructAgent requires agent_id, prompt");
    };
    match manager.instruct(agent_id, prompt.to_string()).await {
        Ok(()) => ToolCallResult::ok("instruction enqueued."),
        Err(err) => ToolCallResult::from_core_error(err),
    }
}

async fn shutdown_agent(manager: &Arc<AgentManager>, arguments: &Value) -> ToolCallResult {
    let Some(agent_id) = arguments.get("agent_id").and_then(Value::as_str) else {
        return ToolCallResult::error("invalid-arguments: shutdownAgent requires agent_id");
    };
    match manager.shutdown(agent_id).await {
        Ok(()) => ToolCallResult::ok("agent shut down."),
        Err(err) => ToolCallResult::from_core_error(err),
    }
}

/// Runs a batch of sub-operations, reporting each one's outcome
/// independently. No sub-operation failure aborts the batch (§4.6).
async fn bulk_manage_agents(manager: &Arc<AgentManager>, arguments: &Value) -> ToolCallResult {
    let Some(operations) = arguments.get("operations").and_then(Value::as_array) else {
        return ToolCallResult::error("invalid-arguments: bulkManageAgents requires operations");
    };
    let default_temperature = arguments.get("temperature").and_then(Value::as_f64);

    let mut lines = Vec::with_capacity(operations.len());
    for (index, op) in operations.iter().enumerate() {
        let result = run_bulk_operation(manager, op, default_temperature).await;
        let status = if result.is_error { "error" } else { "ok" };
        lines.push(format!("[{index}] {status}: {}", result.text));
    }
    ToolCallResult::ok(lines.join("\n"))
}

async fn run_bulk_operation(
    manager: &Arc<AgentManager>,
    op: &Value,
    default_temperature: Option<f64>,
) -> ToolCallResult {
    let Some(action) = op.get("action").and_then(Value::as_str) else {
        return ToolCallResult::error("invalid-arguments: operation missing action");
    };
    match action {
        "launch" => {
            let mut merged = op.clone();
            if merged.get("temperature").is_none() {
                if let (Some(obj), Some(temp)) = (merged.as_object_mut(), default_temperature) {
                    obj.insert("temperature".to_string(), json!(temp));
                }
            }
            launch_agent(manager, &merged).await
        }
        "instruct" => instruct_agent(manager, op).await,
        "shutdown" => shutdown_agent(manager, op).await,
        other => ToolCallResult::error(format!("invalid-arguments: unknown bulk action {other}")),
    }
}
