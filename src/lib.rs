//! Autonomous multi-agent code-building swarm.
//!
//! Given a natural-language task and a project directory, the swarm drives
//! an OpenAI-compatible LLM through a plan → dispatch → review → verify →
//! final-review loop until a working project is on disk. One orchestrator
//! plans and reviews; a bounded pool of workers executes subtasks with
//! sandboxed file, shell, search, web, and SQL tools.
//!
//! [`swarm::Swarm`] is the facade outer surfaces use; the crates
//! `swarm-core`, `swarm-llm`, and `swarm-tools` hold the shared substrate,
//! the LLM transport, and the worker tools.

pub mod models;
pub mod services;
pub mod swarm;

pub use models::{ProjectContext, Subtask, SubtaskStatus, WorkerResult, WorkerStatus};
pub use services::{BuildOutcome, CommandVerifier, Orchestrator, ProjectVerifier};
pub use swarm::Swarm;

pub use swarm_core::{ConfigUpdate, SwarmConfig, SwarmError, SwarmEvent, SwarmResult};
