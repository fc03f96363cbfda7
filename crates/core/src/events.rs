//! Swarm Event Bus
//!
//! Typed publish/subscribe for progress events. Each [`SwarmEvent`] variant
//! corresponds to one documented topic string; external observers (CLI,
//! dashboards) subscribe with a callback and receive every event.
//!
//! Emission is non-blocking for the system as a whole but delivery to each
//! subscriber is synchronous in the publisher's execution context, in
//! subscription order. Subscribers are expected to be cheap forwarders and
//! must not emit events or (un)subscribe from inside a callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Orchestrator phase reported on the `orchestrator:phase` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorPhase {
    Executing,
    Dispatching,
    Reviewing,
    Verifying,
    FinalReview,
}

impl std::fmt::Display for OrchestratorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorPhase::Executing => write!(f, "executing"),
            OrchestratorPhase::Dispatching => write!(f, "dispatching"),
            OrchestratorPhase::Reviewing => write!(f, "reviewing"),
            OrchestratorPhase::Verifying => write!(f, "verifying"),
            OrchestratorPhase::FinalReview => write!(f, "final_review"),
        }
    }
}

/// A progress event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmEvent {
    /// The orchestrator entered a new phase
    OrchestratorPhase { phase: OrchestratorPhase },

    /// A plan (or mini-plan) was accepted
    OrchestratorPlan { subtask_count: usize },

    /// Review decisions were applied to a batch
    OrchestratorReview {
        accepted: usize,
        revised: usize,
        reassigned: usize,
    },

    /// Main-loop iteration accounting
    OrchestratorIteration {
        iteration: u32,
        completed: usize,
        total: usize,
    },

    /// A subtask was assigned to a worker slot
    SubtaskAssigned { subtask_id: String, worker: usize },

    /// A worker is executing a tool for its subtask
    SubtaskProgress {
        subtask_id: String,
        worker: usize,
        tool: String,
    },

    /// A worker finished a subtask (either outcome)
    SubtaskCompleted { subtask_id: String, status: String },

    /// A streamed token chunk from a worker's LLM call
    WorkerToken { worker: usize, content: String },

    /// A tool wrote or patched a file
    FileWritten { path: String, worker: usize },

    /// The build finished successfully
    ProjectDone { summary: String },

    /// The build terminated with an error
    ProjectError { message: String },

    /// A caller is sleeping for the hourly rate-limit window
    RateLimitWait { wait_ms: u64 },

    /// The transport is about to sleep before a retry
    LlmRetry {
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },

    /// Aggregate token usage changed
    TokensUpdate {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_calls: u64,
    },
}

impl SwarmEvent {
    /// The documented topic string for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            SwarmEvent::OrchestratorPhase { .. } => "orchestrator:phase",
            SwarmEvent::OrchestratorPlan { .. } => "orchestrator:plan",
            SwarmEvent::OrchestratorReview { .. } => "orchestrator:review",
            SwarmEvent::OrchestratorIteration { .. } => "orchestrator:iteration",
            SwarmEvent::SubtaskAssigned { .. } => "subtask:assigned",
            SwarmEvent::SubtaskProgress { .. } => "subtask:progress",
            SwarmEvent::SubtaskCompleted { .. } => "subtask:completed",
            SwarmEvent::WorkerToken { .. } => "worker:token",
            SwarmEvent::FileWritten { .. } => "file:written",
            SwarmEvent::ProjectDone { .. } => "project:done",
            SwarmEvent::ProjectError { .. } => "project:error",
            SwarmEvent::RateLimitWait { .. } => "rate-limit:wait",
            SwarmEvent::LlmRetry { .. } => "llm:retry",
            SwarmEvent::TokensUpdate { .. } => "tokens:update",
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&SwarmEvent) + Send + Sync>;

/// Process-wide event bus.
///
/// No delivery guarantees across a process crash; events are transient.
pub struct EventBus {
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber. It receives every event until unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SwarmEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subs.push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subs.retain(|(sub_id, _)| *sub_id != id.0);
    }

    /// Deliver an event to every subscriber, in subscription order.
    pub fn emit(&self, event: SwarmEvent) {
        let subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for (_, callback) in subs.iter() {
            callback(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
