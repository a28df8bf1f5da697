//! Process-wide configuration, loaded once from the environment.
//!
//! The teacher's own `CloudLLMConfig` (`cloudllm::config`) only configures a
//! thought-chain directory and has no env-loading logic. This crate's config
//! surface is wider, so `from_env` gets real validation, but the style is the
//! same: plain `std::env::var`, no config-file crate.

use crate::error::CoreError;

/// Ambient configuration for the orchestration core (see the "Configuration" table).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_embedding_model: String,
    pub agent_default_temperature: f32,
    pub agent_default_iteration_budget: u32,
    pub sandbox_default_image: String,
    pub browser_content_ceiling_chars: usize,
    pub shutdown_teardown_deadline_seconds: u64,
}

impl CoreConfig {
    /// Loads configuration from environment variables, applying defaults for
    /// everything but `LLM_API_KEY`, which is required.
    pub fn from_env() -> Result<Self, CoreError> {
        let llm_api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            CoreError::InvalidArguments("LLM_API_KEY must be set".to_string())
        })?;
        if llm_api_key.trim().is_empty() {
            return Err(CoreError::InvalidArguments(
                "LLM_API_KEY must not be empty".to_string(),
            ));
        }

        Ok(CoreConfig {
            llm_api_key,
            llm_model: env_or("LLM_MODEL", "gpt-4o"),
            llm_embedding_model: env_or("LLM_EMBEDDING_MODEL", "text-embedding-3-large"),
            agent_default_temperature: env_or("AGENT_DEFAULT_TEMPERATURE", "0.0")
                .parse()
                .map_err(|_| {
                    CoreError::InvalidArguments("AGENT_DEFAULT_TEMPERATURE must be a float".into())
                })?,
            agent_default_iteration_budget: env_or("AGENT_DEFAULT_ITERATION_BUDGET", "10")
                .parse()
                .map_err(|_| {
                    CoreError::InvalidArguments(
                        "AGENT_DEFAULT_ITERATION_BUDGET must be a non-negative integer".into(),
                    )
                })?,
            sandbox_default_image: env_or("SANDBOX_DEFAULT_IMAGE", "debian:stable-slim"),
            browser_content_ceiling_chars: env_or("BROWSER_CONTENT_CEILING_CHARS", "8000")
                .parse()
                .map_err(|_| {
                    CoreError::InvalidArguments(
                        "BROWSER_CONTENT_CEILING_CHARS must be a non-negative integer".into(),
                    )
                })?,
            shutdown_teardown_deadline_seconds: env_or("SHUTDOWN_TEARDOWN_DEADLINE_SECONDS", "10")
                .parse()
                .map_err(|_| {
                    CoreError::InvalidArguments(
                        "SHUTDOWN_TEARDOWN_DEADLINE_SECONDS must be a non-negative integer".into(),
                    )
                })?,
        })
    }

    /// Builds a config directly, bypassing the environment. Used by tests and
    /// by callers that already have their settings in hand.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        CoreConfig {
            llm_api_key: api_key.into(),
            llm_model: "gpt-4o".to_string(),
            llm_embedding_model: "text-embedding-3-large".to_string(),
            agent_default_temperature: 0.0,
            agent_default_iteration_budget: 10,
            sandbox_default_image: "debian:stable-slim".to_string(),
            browser_content_ceiling_chars: 8000,
            shutdown_teardown_deadline_seconds: 10,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
