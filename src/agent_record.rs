//! The per-agent record (C5): everything the manager owns about one agent.
//!
//! Fields use plain `std::sync::Mutex`/atomics rather than Tokio's async
//! variants wherever a critical section never spans an `.await` — the same
//! choice the teacher makes for `BashTool`'s settings. Sandbox and browser
//! handles are stored as cheaply cloned values (an id, or a `Clone` session)
//! so the loop can copy them out of their lock and await on the copy,
//! matching spec.md §5's rule that the only suspension points inside an
//! iteration are the chat call, the sandbox exec, the browser fetch, the
//! post-error sleep, and the (short, synchronous) inbox drain.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::browser::BrowserSession;
use crate::inbox::Inbox;
use crate::sandbox::SandboxHandleId;
use crate::status::AgentStatus;
use crate::transcript::{Transcript, Turn};

/// Owned, mutable state for one live agent.
pub struct AgentRecord {
    pub id: String,
    pub seed_system_prompt: String,
    pub temperature: f32,
    pub iteration_budget: u32,
    pub created_at: DateTime<Utc>,

    status: Mutex<AgentStatus>,
    transcript: Mutex<Transcript>,
    iteration: AtomicU32,
    result: Mutex<Option<String>>,
    shutdown_requested: AtomicBool,

    pub inbox: Inbox,
    sandbox_handle: Mutex<Option<SandboxHandleId>>,
    browser_session: Mutex<Option<BrowserSession>>,
}

impl AgentRecord {
    pub fn new(
        id: impl Into<String>,
        seed_system_prompt: impl Into<String>,
        temperature: f32,
        iteration_budget: u32,
    ) -> Self {
        let seed_system_prompt = seed_system_prompt.into();
        AgentRecord {
            id: id.into(),
            seed_system_prompt: seed_system_prompt.clone(),
            temperature,
            iteration_budget,
            created_at: Utc::now(),
            status: Mutex::new(AgentStatus::Initializing),
            transcript: Mutex::new(vec![Turn::System(seed_system_prompt)]),
            iteration: AtomicU32::new(0),
            result: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            inbox: Inbox::new(),
            sandbox_handle: Mutex::new(None),
            browser_session: Mutex::new(None),
        }
    }

    pub fn status(&self) -> AgentStatus {
        *self.status.lock().expect("status mutex poisoned")
    }

    pub fn set_status(&self, status: AgentStatus) {
        *self.status.lock().expect("status mutex poisoned") = status;
    }

    /// Atomically transitions status from `waiting-for-input` to `running`,
    /// returning whether the transition happened. This is the sole gate used
    /// to enforce the "at most one active loop" invariant (P1/P6).
    pub fn try_start_loop(&self) -> bool {
        let mut status = self.status.lock().expect("status mutex poisoned");
        if *status == AgentStatus::WaitingForInput {
            *status = AgentStatus::Running;
            true
        } else {
            false
        }
    }

    /// Atomically checks the inbox and, only if it is still empty, flips
    /// status to `waiting-for-input`. The status mutex is held across both
    /// the inbox check and the flip, so there is no window in which
    /// `waiting-for-input` is visible to a concurrent `try_start_loop` before
    /// the caller has actually stopped looping: a caller that gets `true`
    /// back from this method must unconditionally stop, with no recheck.
    /// If a message arrives after the flip, the next `try_start_loop` call
    /// starts a fresh loop task correctly — that race window no longer
    /// exists between the two competing loop tasks this method is meant to
    /// rule out.
    pub fn try_park(&self) -> bool {
        let mut status = self.status.lock().expect("status mutex poisoned");
        if !self.inbox.is_empty() {
            return false;
        }
        *status = AgentStatus::WaitingForInput;
        true
    }

    pub fn transcript_snapshot(&self) -> Transcript {
        self.transcript.lock().expect("transcript mutex poisoned").clone()
    }

    pub fn push_turn(&self, turn: crate::transcript::Turn) {
        self.transcript.lock().expect("transcript mutex poisoned").push(turn);
    }

    pub fn iteration(&self) -> u32 {
        self.iteration.load(Ordering::SeqCst)
    }

    pub fn increment_iteration(&self) -> u32 {
        self.iteration.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn result(&self) -> Option<String> {
        self.result.lock().expect("result mutex poisoned").clone()
    }

    pub fn set_result(&self, result: impl Into<String>) {
        *self.result.lock().expect("result mutex poisoned") = Some(result.into());
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn sandbox_handle(&self) -> Option<SandboxHandleId> {
        self.sandbox_handle.lock().expect("sandbox mutex poisoned").clone()
    }

    pub fn set_sandbox_handle(&self, handle: SandboxHandleId) {
        *self.sandbox_handle.lock().expect("sandbox mutex poisoned") = Some(handle);
    }

    pub fn browser_session(&self) -> Option<BrowserSession> {
        self.browser_session
            .lock()
            .expect("browser mutex poisoned")
            .clone()
    }

    pub fn get_or_init_browser_session(
        &self,
        init: impl FnOnce() -> BrowserSession,
    ) -> BrowserSession {
        let mut slot = self.browser_session.lock().expect("browser mutex poisoned");
        if slot.is_none() {
            *slot = Some(init());
        }
        slot.clone().expect("just initialized")
    }
}
