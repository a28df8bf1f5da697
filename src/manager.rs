//! The agent manager (C7): registry of live agents, wake discipline, and the
//! public operations every external tool (C9) ultimately calls.
//!
//! The registry is a `tokio::sync::RwLock<HashMap<..>>` — readers for
//! `list`/`status`/`broadcast`/`send`, the writer role for `launch`/
//! `shutdown` — mirroring §3's "Registry" and §4.5's lock-ordering rule: the
//! registry lock is always released before any per-agent inbox is touched
//! (see [`AgentManager::broadcast`], which clones the agent list out from
//! under the reader lock before doing any inbox work).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::agent_loop;
use crate::agent_record::AgentRecord;
use crate::browser::PageFetcher;
use crate::bus::{Message, MessageBus};
use crate::chat::ChatService;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::event::{CoreEvent, CoreEventHandler, NullEventHandler};
use crate::sandbox::SandboxDriver;
use crate::status::AgentStatus;
use crate::transcript::Transcript;

/// Lightweight snapshot returned by `list` (and the `list_agents` tool).
#[derive(Debug, Clone)]
pub struct AgentSummary {
    pub id: String,
    pub status: AgentStatus,
    pub result: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Full snapshot returned by `status` (and the `getAgentStatus` external tool).
#[derive(Debug, Clone)]
pub struct AgentDetail {
    pub id: String,
    pub status: AgentStatus,
    pub result: Option<String>,
    pub messages: Transcript,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Registry of live agents plus the shared services every loop task needs.
pub struct AgentManager {
    registry: RwLock<HashMap<String, Arc<AgentRecord>>>,
    bus: Arc<MessageBus>,
    sandbox_driver: Arc<dyn SandboxDriver>,
    page_fetcher: Arc<dyn PageFetcher>,
    chat_service: Arc<dyn ChatService>,
    event_handler: Arc<dyn CoreEventHandler>,
    config: Arc<CoreConfig>,
}

impl AgentManager {
    pub fn new(
        sandbox_driver: Arc<dyn SandboxDriver>,
        page_fetcher: Arc<dyn PageFetcher>,
        chat_service: Arc<dyn ChatService>,
        config: Arc<CoreConfig>,
    ) -> Self {
        AgentManager {
            registry: RwLock::new(HashMap::new()),
            bus: Arc::new(MessageBus::new()),
            sandbox_driver,
            page_fetcher,
            chat_service,
            event_handler: Arc::new(NullEventHandler),
            config,
        }
    }

    /// Builder-style: attaches an observability handler (matching
    /// `MCPServerBuilder`'s fluent `with_*` style).
    pub fn with_event_handler(mut self, handler: Arc<dyn CoreEventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    pub(crate) fn sandbox_driver(&self) -> &Arc<dyn SandboxDriver> {
        &self.sandbox_driver
    }

    pub(crate) fn page_fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.page_fetcher
    }

    pub(crate) fn chat_service(&self) -> &Arc<dyn ChatService> {
        &self.chat_service
    }

    pub(crate) fn config(&self) -> &Arc<CoreConfig> {
        &self.config
    }

    pub(crate) fn event_handler(&self) -> &Arc<dyn CoreEventHandler> {
        &self.event_handler
    }

    /// Creates a new agent, allocates its sandbox, and starts its loop task.
    pub async fn launch(
        self: &Arc<Self>,
        system_prompt: String,
        user_prompt: String,
        temperature: f32,
        iteration_budget: Option<u32>,
    ) -> Result<String, CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let budget = iteration_budget.unwrap_or(self.config.agent_default_iteration_budget);
        let seed = format!("{system_prompt}\n\n{}", meta_instructions(budget));

        let handle = self
            .sandbox_driver
            .create(&self.config.sandbox_default_image)
            .await?;
        self.sandbox_driver.run_indefinitely(&handle).await?;

        let record = Arc::new(AgentRecord::new(id.clone(), seed, temperature, budget));
        record.set_sandbox_handle(handle);
        record.inbox.push(user_prompt);

        {
            let mut registry = self.registry.write().await;
            registry.insert(id.clone(), Arc::clone(&record));
        }
        self.bus.subscribe(&id, &id);

        if log::log_enabled!(log::Level::Info) {
            log::info!("agent {id} launched (budget={budget}, temperature={temperature})");
        }
        self.event_handler
            .on_event(&CoreEvent::AgentLaunched {
                agent_id: id.clone(),
            })
            .await;

        self.spawn_loop(Arc::clone(&record));
        Ok(id)
    }

    /// Enqueues `prompt` for `id` and wakes it if it was sleeping.
    pub async fn instruct(self: &Arc<Self>, id: &str, prompt: String) -> Result<(), CoreError> {
        let record = self.get(id).await?;
        record.inbox.push(prompt);
        self.wake_if_waiting(&record);
        Ok(())
    }

    /// Delivers `message` to every other non-terminal agent's inbox,
    /// waking each sleeping recipient (§4.5, resolving Open Question (b)).
    pub async fn broadcast(self: &Arc<Self>, sender: &str, message: String) -> Result<(), CoreError> {
        let snapshot: Vec<(String, Arc<AgentRecord>)> = {
            let registry = self.registry.read().await;
            registry
                .iter()
                .map(|(id, record)| (id.clone(), Arc::clone(record)))
                .collect()
        };

        let formatted = format!("[broadcast from {sender}]: {message}");
        for (id, record) in snapshot {
            if id == sender || record.status().is_terminal() {
                continue;
            }
            self.bus.publish(Message {
                from: sender.to_string(),
                topic: id.clone(),
                content: formatted.clone(),
            });
            for delivered in self.bus.drain(&id) {
                record.inbox.push(delivered.content);
            }
            self.wake_if_waiting(&record);
        }
        Ok(())
    }

    /// Delivers `message` to exactly one recipient's inbox, waking it if sleeping.
    pub async fn send(
        self: &Arc<Self>,
        sender: &str,
        recipient: &str,
        message: String,
    ) -> Result<(), CoreError> {
        let record = self.get(recipient).await?;
        let formatted = format!("[message from {sender}]: {message}");
        self.bus.publish(Message {
            from: sender.to_string(),
            topic: recipient.to_string(),
            content: formatted,
        });
        for delivered in self.bus.drain(recipient) {
            record.inbox.push(delivered.content);
        }
        self.wake_if_waiting(&record);
        Ok(())
    }

    pub async fn status(&self, id: &str) -> Result<AgentDetail, CoreError> {
        let record = self.get(id).await?;
        Ok(AgentDetail {
            id: record.id.clone(),
            status: record.status(),
            result: record.result(),
            messages: record.transcript_snapshot(),
            created_at: record.created_at,
        })
    }

    pub async fn list(&self) -> Vec<AgentSummary> {
        let registry = self.registry.read().await;
        registry
            .values()
            .map(|record| AgentSummary {
                id: record.id.clone(),
                status: record.status(),
                result: record.result(),
                created_at: record.created_at,
            })
            .collect()
    }

    /// Used by the `list_agents` tool dispatch: every agent except the caller.
    pub(crate) async fn list_excluding(&self, exclude_id: &str) -> Vec<AgentSummary> {
        self.list()
            .await
            .into_iter()
            .filter(|summary| summary.id != exclude_id)
            .collect()
    }

    /// Tears down an agent's sandbox and removes it from the registry.
    /// Subsequent operations on `id` fail with `unknown-agent` (P9).
    pub async fn shutdown(self: &Arc<Self>, id: &str) -> Result<(), CoreError> {
        let record = {
            let mut registry = self.registry.write().await;
            registry.remove(id)
        };
        let Some(record) = record else {
            return Err(CoreError::UnknownAgent(id.to_string()));
        };

        record.request_shutdown();
        self.bus.unsubscribe_all(id);

        if let Some(handle) = record.sandbox_handle() {
            let deadline = Duration::from_secs(self.config.shutdown_teardown_deadline_seconds);
            if let Err(err) = self.sandbox_driver.stop_and_remove(&handle, deadline).await {
                log::warn!("sandbox teardown failed for agent {id}: {err}");
            }
        }

        self.event_handler
            .on_event(&CoreEvent::AgentShutdown {
                agent_id: id.to_string(),
            })
            .await;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Arc<AgentRecord>, CoreError> {
        self.registry
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownAgent(id.to_string()))
    }

    /// The wake rule (critical invariant #2): a fresh loop task starts only
    /// when `try_start_loop` observes `waiting-for-input`. A `running` agent
    /// silently absorbs the new inbox entry at its own next cycle.
    fn wake_if_waiting(self: &Arc<Self>, record: &Arc<AgentRecord>) {
        if record.try_start_loop() {
            self.spawn_loop(Arc::clone(record));
        }
    }

    fn spawn_loop(self: &Arc<Self>, record: Arc<AgentRecord>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            agent_loop::run(manager, record).await;
        });
    }
}

fn meta_instructions(budget: u32) -> String {
    format!(
        "You are operating in a sandboxed command-execution environment. \
You work iteratively with a total budget of {budget} iterations. \
When your task is complete, call the `complete_task` tool. \
If you reach the iteration budget, you must also call `complete_task` with a summary of what you accomplished."
    )
}
