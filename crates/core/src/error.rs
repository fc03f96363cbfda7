//! Error Handling
//!
//! Unified error types for the swarm engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum SwarmError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// LLM transport errors that survived all retries
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool execution errors
    #[error("Tool error: {0}")]
    Tool(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// No subtask is ready, none are running, and none have permanently
    /// failed: the dependency graph cannot make progress.
    #[error("Deadlock: {0}")]
    Deadlock(String),

    /// One or more subtasks exhausted their retry budget
    #[error("Subtasks failed: {0}")]
    SubtasksFailed(String),

    /// The planner produced no usable subtasks
    #[error("Plan rejected: {0}")]
    PlanRejected(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type SwarmResult<T> = Result<T, SwarmError>;

impl SwarmError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a deadlock error
    pub fn deadlock(msg: impl Into<String>) -> Self {
        Self::Deadlock(msg.into())
    }

    /// Create a subtasks-failed error
    pub fn subtasks_failed(msg: impl Into<String>) -> Self {
        Self::SubtasksFailed(msg.into())
    }

    /// Create a plan-rejected error
    pub fn plan_rejected(msg: impl Into<String>) -> Self {
        Self::PlanRejected(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
