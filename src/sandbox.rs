//! The sandbox driver contract (C1) and a local-process reference
//! implementation.
//!
//! The trait is grounded on [`crate::chat::ChatService`]'s shape (an
//! `async_trait`, `Send + Sync` seam with a manual error enum); the reference
//! implementation, [`LocalProcessSandbox`], is grounded directly on
//! `tools::bash::BashTool`: a `tokio::process::Command` wrapper with a
//! builder-style `with_*` constructor, a timeout, and output captured as a
//! single string. A real container-backed driver is out of scope (§1
//! Non-goals); this one exists so the crate has a working default the way
//! the teacher ships `BashTool` rather than leaving tool execution as a bare
//! trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Opaque handle identifying one live sandbox. Driver-assigned, driver-opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxHandleId(pub String);

impl fmt::Display for SandboxHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure returned by a [`SandboxDriver`] operation.
#[derive(Debug, Clone)]
pub struct SandboxError {
    pub message: String,
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sandbox error: {}", self.message)
    }
}

impl std::error::Error for SandboxError {}

impl SandboxError {
    fn new(message: impl Into<String>) -> Self {
        SandboxError {
            message: message.into(),
        }
    }
}

/// The sandboxed-execution seam (C1). Implementations must be safe to share
/// across every agent's loop task.
#[async_trait]
pub trait SandboxDriver: Send + Sync {
    /// Allocates a new sandbox from `image`, returning its handle.
    async fn create(&self, image: &str) -> Result<SandboxHandleId, SandboxError>;

    /// Starts (or confirms) a long-lived process inside the sandbox so it
    /// survives between `exec` calls.
    async fn run_indefinitely(&self, handle: &SandboxHandleId) -> Result<(), SandboxError>;

    /// Executes `argv` inside the sandbox, returning combined stdout+stderr.
    async fn exec(&self, handle: &SandboxHandleId, argv: &[String]) -> Result<String, SandboxError>;

    /// Tears the sandbox down, waiting at most `deadline` before giving up.
    async fn stop_and_remove(
        &self,
        handle: &SandboxHandleId,
        deadline: Duration,
    ) -> Result<(), SandboxError>;
}

/// A reference [`SandboxDriver`] that runs commands as local OS processes
/// rather than inside a container. No isolation guarantees; exists so the
/// crate is runnable without a real container runtime.
pub struct LocalProcessSandbox {
    shell: &'static str,
    keep_alive: Mutex<HashMap<SandboxHandleId, Child>>,
}

impl LocalProcessSandbox {
    pub fn new() -> Self {
        LocalProcessSandbox {
            shell: "/bin/sh",
            keep_alive: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the shell binary used for `exec` (builder-style, matching
    /// `BashTool::with_timeout`).
    pub fn with_shell(mut self, shell: &'static str) -> Self {
        self.shell = shell;
        self
    }
}

impl Default for LocalProcessSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxDriver for LocalProcessSandbox {
    async fn create(&self, _image: &str) -> Result<SandboxHandleId, SandboxError> {
        Ok(SandboxHandleId(uuid::Uuid::new_v4().to_string()))
    }

    async fn run_indefinitely(&self, handle: &SandboxHandleId) -> Result<(), SandboxError> {
        let child = Command::new("sleep")
            .arg("infinity")
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::new(format!("failed to start keep-alive process: {e}")))?;
        self.keep_alive
            .lock()
            .expect("sandbox mutex poisoned")
            .insert(handle.clone(), child);
        Ok(())
    }

    async fn exec(&self, _handle: &SandboxHandleId, argv: &[String]) -> Result<String, SandboxError> {
        if argv.is_empty() {
            return Err(SandboxError::new("argv must not be empty"));
        }
        let command_line = argv.join(" ");
        let output = Command::new(self.shell)
            .arg("-c")
            .arg(&command_line)
            .output()
            .await
            .map_err(|e| SandboxError::new(format!("failed to execute command: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(SandboxError::new(format!(
                "command exited with status {code}: {combined}"
            )));
        }
        Ok(combined)
    }

    async fn stop_and_remove(
        &self,
        handle: &SandboxHandleId,
        deadline: Duration,
    ) -> Result<(), SandboxError> {
        let child = self
            .keep_alive
            .lock()
            .expect("sandbox mutex poisoned")
            .remove(handle);
        let Some(mut child) = child else {
            return Ok(());
        };
        match timeout(deadline, child.kill()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SandboxError::new(format!("failed to kill sandbox process: {e}"))),
            Err(_) => Err(SandboxError::new("teardown deadline exceeded")),
        }
    }
}
