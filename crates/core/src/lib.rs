//! Shared substrate for the swarm engine.
//!
//! This crate holds the process-wide primitives that every other layer
//! builds on: the error taxonomy, runtime-mutable configuration, the typed
//! event bus, the rate limiter, the token accountant, the per-path file
//! lock, and the JSON salvager. It has no knowledge of the LLM wire
//! protocol or of subtasks; those live in `swarm-llm` and the root crate.

pub mod config;
pub mod error;
pub mod events;
pub mod file_lock;
pub mod json_salvage;
pub mod rate_limit;
pub mod text;
pub mod tokens;

pub use config::{ConfigUpdate, SharedConfig, SwarmConfig};
pub use error::{SwarmError, SwarmResult};
pub use events::{EventBus, OrchestratorPhase, SubscriptionId, SwarmEvent};
pub use file_lock::FileLocks;
pub use rate_limit::RateLimiter;
pub use tokens::{TokenAccountant, TokenTotals};
