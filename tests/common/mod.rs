//! Shared scaffolding for the scenario/invariant integration tests.
//!
//! `ScriptedChatService` is the template the teacher's `MockClient`
//! (`tests/agent_tests.rs`) establishes: a stub that replays a predetermined,
//! per-agent sequence of assistant turns rather than calling a real backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentgrid::{AssistantTurn, ChatError, ChatRequest, ChatService, CoreConfig};
use agentgrid::browser::{FetchError, PageFetcher};
use agentgrid::manager::AgentManager;
use agentgrid::sandbox::LocalProcessSandbox;
use async_trait::async_trait;

/// Replays a fixed script of assistant turns. Scripts are looked up by the
/// request's system prompt prefix so each agent in a multi-agent test can
/// carry its own independent script.
pub struct ScriptedChatService {
    scripts: Mutex<HashMap<String, Vec<AssistantTurn>>>,
    delays: Mutex<HashMap<String, Duration>>,
    fallback: AssistantTurn,
}

impl ScriptedChatService {
    pub fn new() -> Self {
        ScriptedChatService {
            scripts: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            fallback: AssistantTurn {
                content: String::new(),
                tool_calls: vec![],
            },
        }
    }

    /// Registers the turns to replay for requests whose system prompt
    /// starts with `system_prompt_prefix` (the caller's original system
    /// prompt, before the meta-instructions are appended).
    pub fn script_for(self, system_prompt_prefix: &str, turns: Vec<AssistantTurn>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(system_prompt_prefix.to_string(), turns);
        self
    }

    /// Sleeps `delay` before replying to any request whose system prompt
    /// starts with `system_prompt_prefix`. Used to widen a race window in
    /// tests that need to catch an agent mid-iteration.
    pub fn with_delay(self, system_prompt_prefix: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(system_prompt_prefix.to_string(), delay);
        self
    }
}

#[async_trait]
impl ChatService for ScriptedChatService {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, ChatError> {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.system.starts_with(prefix.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        for (prefix, turns) in scripts.iter_mut() {
            if request.system.starts_with(prefix.as_str()) {
                if turns.is_empty() {
                    return Ok(self.fallback.clone());
                }
                return Ok(turns.remove(0));
            }
        }
        Ok(self.fallback.clone())
    }
}

/// Wraps another `ChatService` and records, per distinct system prompt, how
/// many calls for that prompt were ever in flight at once. Used to prove that
/// an agent never has two concurrently active loop tasks both calling out to
/// the chat service at the same time (P1/P6) — a duplicate loop task would
/// show up here as a peak concurrency greater than one.
pub struct ConcurrencyTrackingChatService {
    inner: Arc<dyn ChatService>,
    current: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
}

impl ConcurrencyTrackingChatService {
    pub fn wrap(inner: Arc<dyn ChatService>) -> Arc<Self> {
        Arc::new(ConcurrencyTrackingChatService {
            inner,
            current: Mutex::new(HashMap::new()),
            peak: Mutex::new(HashMap::new()),
        })
    }

    /// The highest number of simultaneously in-flight calls observed for any
    /// system prompt starting with `system_prompt_prefix`.
    pub fn peak_concurrency(&self, system_prompt_prefix: &str) -> usize {
        self.peak
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(system_prompt_prefix))
            .map(|(_, count)| *count)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChatService for ConcurrencyTrackingChatService {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, ChatError> {
        let key = request.system.clone();
        {
            let mut current = self.current.lock().unwrap();
            let count = current.entry(key.clone()).or_insert(0);
            *count += 1;
            let mut peak = self.peak.lock().unwrap();
            let recorded = peak.entry(key.clone()).or_insert(0);
            if *count > *recorded {
                *recorded = *count;
            }
        }

        let result = self.inner.complete(request).await;

        if let Some(count) = self.current.lock().unwrap().get_mut(&key) {
            *count -= 1;
        }
        result
    }
}

/// A fetcher that always returns the same fixed HTML body, regardless of URL.
pub struct FixedPageFetcher {
    pub body: String,
}

#[async_trait]
impl PageFetcher for FixedPageFetcher {
    async fn fetch(&self, _agent_id: &str, _url: &str) -> Result<String, FetchError> {
        Ok(self.body.clone())
    }
}

/// Installs `env_logger` as the subscriber for this test binary, the way the
/// teacher's own example binaries do. Idempotent and safe to call from every
/// test: `try_init` silently no-ops once a subscriber is already installed.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn manager_with(chat: ScriptedChatService) -> Arc<AgentManager> {
    manager_with_fetcher(chat, "<article>stub page</article>".to_string())
}

pub fn manager_with_fetcher(chat: ScriptedChatService, page_body: String) -> Arc<AgentManager> {
    manager_with_chat_service_and_fetcher(Arc::new(chat), page_body)
}

pub fn manager_with_chat_service_and_fetcher(
    chat: Arc<dyn ChatService>,
    page_body: String,
) -> Arc<AgentManager> {
    init_logging();
    Arc::new(AgentManager::new(
        Arc::new(LocalProcessSandbox::new()),
        Arc::new(FixedPageFetcher { body: page_body }),
        chat,
        Arc::new(CoreConfig::with_api_key("test-key")),
    ))
}

/// Polls `status` until it matches `target` or the attempt budget runs out.
pub async fn wait_for_status(
    manager: &Arc<AgentManager>,
    id: &str,
    target: agentgrid::AgentStatus,
) -> agentgrid::AgentStatus {
    for _ in 0..200 {
        if let Ok(detail) = manager.status(id).await {
            if detail.status == target {
                return detail.status;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    manager.status(id).await.map(|d| d.status).unwrap_or(target)
}
