//! The agent loop (C6): the think-act-observe state machine. The hardest
//! piece of the system (§4.3).
//!
//! One call to [`run`] is one loop task; `AgentManager::spawn_loop` is the
//! only place that creates one, always gated by
//! [`AgentRecord::try_start_loop`] so at most one loop task is ever active
//! per agent (invariant P1/P6). The loop is the sole writer of the
//! transcript, status, and iteration counter (other components only touch
//! the inbox and the shutdown flag) — see §4.3's "Concurrency of per-agent
//! state".

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::agent_record::AgentRecord;
use crate::browser::BrowserSession;
use crate::chat::{ChatRequest, ToolCallRequest};
use crate::event::CoreEvent;
use crate::manager::AgentManager;
use crate::status::AgentStatus;
use crate::tool_catalog::{self, ToolName};
use crate::transcript::Turn;

const TRANSPORT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Runs one agent's loop until it sleeps, completes, fails, or is shut down.
pub(crate) async fn run(manager: Arc<AgentManager>, record: Arc<AgentRecord>) {
    transition(&manager, &record, AgentStatus::Running).await;

    loop {
        // 1. Inbox drain.
        for message in record.inbox.drain() {
            record.push_turn(Turn::User(message));
        }

        // 2. Budget check.
        let iteration = record.increment_iteration();
        if iteration > record.iteration_budget {
            record.push_turn(Turn::Failure(format!(
                "iteration budget ({}) exhausted",
                record.iteration_budget
            )));
            if log::log_enabled!(log::Level::Error) {
                log::error!("agent {} exhausted its iteration budget", record.id);
            }
            transition(&manager, &record, AgentStatus::Failed).await;
            return;
        }

        // 3. Shutdown check. Registry removal and resource teardown already
        // happened in `AgentManager::shutdown`; the loop just stops.
        if record.shutdown_requested() {
            log::info!("agent {} observed shutdown signal, exiting loop", record.id);
            return;
        }

        // 4. Compose prompt. The iteration-context turn is request-only; it
        // is never appended to the transcript of record.
        let context_turn = Turn::User(format!(
            "iteration {iteration} of {}",
            record.iteration_budget
        ));
        let mut outbound = record.transcript_snapshot();
        outbound.push(context_turn);

        let request = ChatRequest {
            system: record.seed_system_prompt.clone(),
            transcript: outbound,
            tools: tool_catalog::catalog(),
            temperature: record.temperature,
        };

        // 5. Call chat service.
        let assistant_turn = match manager.chat_service().complete(request).await {
            Err(err) => {
                if log::log_enabled!(log::Level::Warn) {
                    log::warn!("agent {} chat service error: {err}", record.id);
                }
                record.push_turn(Turn::User(format!("chat service error: {err}")));
                tokio::time::sleep(TRANSPORT_ERROR_BACKOFF).await;
                continue;
            }
            Ok(turn) => turn,
        };

        // 6. Record the assistant turn.
        record.push_turn(Turn::Assistant {
            content: assistant_turn.content.clone(),
            tool_calls: assistant_turn.tool_calls.clone(),
        });
        record.set_result(assistant_turn.content.clone());

        // 7. No tool calls requested: park, unless work already arrived.
        // `try_park` checks the inbox and flips status atomically under one
        // lock hold, so there is no window in which `waiting-for-input` is
        // visible to a concurrent `wake_if_waiting` before this task has
        // actually stopped (the re-entrant wake race, P1/P6).
        if assistant_turn.tool_calls.is_empty() {
            if !record.try_park() {
                continue;
            }
            emit_status_change(&manager, &record.id, AgentStatus::Running, AgentStatus::WaitingForInput).await;
            return;
        }

        // 8. Dispatch tool calls in request order.
        let mut exit_after_dispatch = false;
        for call in &assistant_turn.tool_calls {
            let (content, is_error) = dispatch_tool(&manager, &record, call).await;
            record.push_turn(Turn::ToolResult {
                call_id: call.id.clone(),
                content: content.clone(),
                is_error,
            });

            match ToolName::from_str(&call.name) {
                Some(ToolName::CompleteTask) => {
                    record.set_status(AgentStatus::Completed);
                    emit_status_change(&manager, &record.id, AgentStatus::Running, AgentStatus::Completed).await;
                    exit_after_dispatch = true;
                    break;
                }
                Some(ToolName::SetStatus) if !is_error => {
                    if record.try_park() {
                        emit_status_change(
                            &manager,
                            &record.id,
                            AgentStatus::Running,
                            AgentStatus::WaitingForInput,
                        )
                        .await;
                        exit_after_dispatch = true;
                        break;
                    }
                    // Otherwise: new work already pending, stay running.
                }
                _ => {}
            }
        }

        if exit_after_dispatch {
            return;
        }
        // 9. Loop back to step 1 so the model can observe the tool results.
    }
}

async fn transition(manager: &Arc<AgentManager>, record: &Arc<AgentRecord>, to: AgentStatus) {
    let from = record.status();
    record.set_status(to);
    emit_status_change(manager, &record.id, from, to).await;
}

async fn emit_status_change(manager: &Arc<AgentManager>, agent_id: &str, from: AgentStatus, to: AgentStatus) {
    manager
        .event_handler()
        .on_event(&CoreEvent::AgentStatusChanged {
            agent_id: agent_id.to_string(),
            from,
            to,
        })
        .await;
}

/// Executes one tool call and returns its `(result-text, is-error)` pair.
/// Never panics: a failing fetcher, sandbox, or malformed argument always
/// comes back as a returned error string (§4.4, §7).
async fn dispatch_tool(
    manager: &Arc<AgentManager>,
    record: &Arc<AgentRecord>,
    call: &ToolCallRequest,
) -> (String, bool) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "agent {} dispatching tool {} (args preview: {:.80})",
            record.id,
            call.name,
            call.arguments.to_string()
        );
    }
    manager
        .event_handler()
        .on_event(&CoreEvent::ToolDispatched {
            agent_id: record.id.clone(),
            tool_name: call.name.clone(),
            iteration: record.iteration(),
        })
        .await;

    let Some(tool) = ToolName::from_str(&call.name) else {
        return (format!("unknown tool: {}", call.name), true);
    };

    match tool {
        ToolName::CompleteTask => ("task marked complete.".to_string(), false),

        ToolName::SetStatus => match call.arguments.get("status").and_then(|v| v.as_str()) {
            Some("waiting-for-input") => ("status set to waiting-for-input.".to_string(), false),
            Some(other) => (format!("invalid status value: {other}"), true),
            None => ("missing required argument: status".to_string(), true),
        },

        ToolName::ListAgents => {
            let summaries = manager.list_excluding(&record.id).await;
            let entries: Vec<serde_json::Value> = summaries
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "status": s.status.to_string(),
                        "latest-result": s.result,
                    })
                })
                .collect();
            (serde_json::Value::Array(entries).to_string(), false)
        }

        ToolName::BroadcastMessage => {
            let Some(message) = call.arguments.get("message").and_then(|v| v.as_str()) else {
                return ("missing required argument: message".to_string(), true);
            };
            match manager.broadcast(&record.id, message.to_string()).await {
                Ok(()) => ("broadcast delivered.".to_string(), false),
                Err(err) => (err.to_string(), true),
            }
        }

        ToolName::SendMessage => {
            let recipient = call.arguments.get("recipient_id").and_then(|v| v.as_str());
            let message = call.arguments.get("message").and_then(|v| v.as_str());
            let (Some(recipient), Some(message)) = (recipient, message) else {
                return (
                    "missing required argument: recipient_id or message".to_string(),
                    true,
                );
            };
            match manager.send(&record.id, recipient, message.to_string()).await {
                Ok(()) => (format!("message delivered to {recipient}."), false),
                Err(err) => (err.to_string(), true),
            }
        }

        ToolName::ExecuteCommand => {
            let Some(command) = call.arguments.get("command").and_then(|v| v.as_str()) else {
                return ("missing required argument: command".to_string(), true);
            };
            let Some(handle) = record.sandbox_handle() else {
                return ("sandbox unavailable: no handle allocated for this agent".to_string(), true);
            };
            match manager
                .sandbox_driver()
                .exec(&handle, &[command.to_string()])
                .await
            {
                Ok(output) => (output, false),
                Err(err) => (err.to_string(), true),
            }
        }

        ToolName::BrowseWeb => {
            let Some(url) = call.arguments.get("url").and_then(|v| v.as_str()) else {
                return ("missing required argument: url".to_string(), true);
            };
            let fetcher = Arc::clone(manager.page_fetcher());
            let agent_id = record.id.clone();
            let session = record
                .get_or_init_browser_session(|| BrowserSession::new(fetcher, agent_id));
            let ceiling = manager.config().browser_content_ceiling_chars;
            match session.browse(url, ceiling).await {
                Ok(text) => (text, false),
                Err(err) => (err.to_string(), true),
            }
        }
    }
}
