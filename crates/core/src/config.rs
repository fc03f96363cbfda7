//! Runtime Configuration
//!
//! The single configuration value for a swarm run. All fields are mutable
//! at runtime through [`SharedConfig`]; the LLM transport re-reads the
//! model id, base URL, and API key on every call so credential rotation
//! takes effect without rebuilding the client.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Swarm engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// API key for the LLM service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model id sent with every chat completion
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the OpenAI-compatible endpoint (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum in-flight LLM calls per limiter
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum successful limiter acquisitions per rolling hour
    #[serde(default = "default_max_calls_per_hour")]
    pub max_calls_per_hour: usize,
    /// Maximum orchestrator main-loop iterations per build
    #[serde(default = "default_max_orch_iterations")]
    pub max_orch_iterations: u32,
    /// Maximum tool-calling iterations per worker run
    #[serde(default = "default_max_tool_loops")]
    pub max_tool_loops: u32,
    /// Maximum attempts per subtask before it fails permanently
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Number of parallel workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Sampling temperature for LLM calls
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate per LLM call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_calls_per_hour() -> usize {
    50
}

fn default_max_orch_iterations() -> u32 {
    50
}

fn default_max_tool_loops() -> u32 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_worker_count() -> usize {
    3
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            max_concurrent: default_max_concurrent(),
            max_calls_per_hour: default_max_calls_per_hour(),
            max_orch_iterations: default_max_orch_iterations(),
            max_tool_loops: default_max_tool_loops(),
            max_attempts: default_max_attempts(),
            worker_count: default_worker_count(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl SwarmConfig {
    /// Validate the configuration, returning a message for the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.base_url.trim().is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".to_string());
        }
        if self.max_calls_per_hour == 0 {
            return Err("max_calls_per_hour must be at least 1".to_string());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Full endpoint URL for chat completions.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Partial update applied to a [`SwarmConfig`] at runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_concurrent: Option<usize>,
    pub max_calls_per_hour: Option<usize>,
    pub max_orch_iterations: Option<u32>,
    pub max_tool_loops: Option<u32>,
    pub max_attempts: Option<u32>,
    pub worker_count: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ConfigUpdate {
    /// Whether this update touches the rate-limiter bounds. The facade uses
    /// this to push new limits into the live limiters.
    pub fn affects_rate_limits(&self) -> bool {
        self.max_concurrent.is_some() || self.max_calls_per_hour.is_some()
    }

    /// Apply this update to a configuration value.
    pub fn apply_to(&self, config: &mut SwarmConfig) {
        if let Some(v) = &self.api_key {
            config.api_key = Some(v.clone());
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = &self.base_url {
            config.base_url = v.clone();
        }
        if let Some(v) = self.max_concurrent {
            config.max_concurrent = v;
        }
        if let Some(v) = self.max_calls_per_hour {
            config.max_calls_per_hour = v;
        }
        if let Some(v) = self.max_orch_iterations {
            config.max_orch_iterations = v;
        }
        if let Some(v) = self.max_tool_loops {
            config.max_tool_loops = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.worker_count {
            config.worker_count = v;
        }
        if let Some(v) = self.temperature {
            config.temperature = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
    }
}

/// Shared, runtime-mutable configuration handle.
///
/// Readers take a snapshot; they never hold the lock across an await point.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<SwarmConfig>>,
}

impl SharedConfig {
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Clone the current configuration.
    pub fn snapshot(&self) -> SwarmConfig {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Apply a partial update and return the resulting configuration.
    pub fn update(&self, update: &ConfigUpdate) -> SwarmConfig {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        update.apply_to(&mut guard);
        guard.clone()
    }

    /// Replace the configuration wholesale.
    pub fn replace(&self, config: SwarmConfig) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(SwarmConfig::default())
    }
}
