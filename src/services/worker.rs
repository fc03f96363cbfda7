//! Worker Loop
//!
//! A worker drives one subtask to completion: it streams an LLM call with
//! the full tool catalog, executes the returned tool calls locally, feeds
//! the results back, and repeats until the model answers without tool
//! calls or the loop budget runs out.
//!
//! Each worker owns its own rate limiter so concurrent workers do not
//! starve each other on the shared concurrency slots. A failure anywhere
//! in the loop becomes a `failed` WorkerResult; it never propagates to
//! sibling workers or the orchestrator.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use swarm_core::{EventBus, FileLocks, RateLimiter, SwarmConfig, SwarmEvent};
use swarm_llm::{ChatOptions, LlmClient, Message};
use swarm_tools::{ToolContext, ToolRegistry};

use crate::models::{Subtask, WorkerResult, WorkerStatus};
use crate::services::prompts;

pub struct WorkerAssignment {
    pub subtask: Subtask,
    pub project_root: PathBuf,
    pub file_tree: Option<String>,
    /// Prerendered summaries of completed sibling subtasks
    pub sibling_context: String,
}

pub struct Worker {
    index: usize,
    client: Arc<LlmClient>,
    /// This worker's private limiter
    limiter: Arc<RateLimiter>,
    registry: Arc<ToolRegistry>,
    file_locks: Arc<FileLocks>,
    bus: Arc<EventBus>,
    max_tool_loops: u32,
}

impl Worker {
    pub fn new(
        index: usize,
        client: Arc<LlmClient>,
        registry: Arc<ToolRegistry>,
        file_locks: Arc<FileLocks>,
        bus: Arc<EventBus>,
        config: &SwarmConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.max_concurrent,
            config.max_calls_per_hour,
            bus.clone(),
        ));
        Self {
            index,
            client,
            limiter,
            registry,
            file_locks,
            bus,
            max_tool_loops: config.max_tool_loops,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Drive one subtask. Always returns a WorkerResult; never panics the
    /// caller's join.
    pub async fn run(&self, assignment: WorkerAssignment) -> WorkerResult {
        let subtask_id = assignment.subtask.id.clone();
        let artifacts = Arc::new(Mutex::new(Vec::new()));
        let tool_ctx = ToolContext::new(
            assignment.project_root.clone(),
            self.index,
            self.file_locks.clone(),
            artifacts.clone(),
            self.bus.clone(),
        );

        let mut messages = vec![
            Message::system(prompts::worker_system_prompt(
                self.index,
                &assignment.project_root.display().to_string(),
            )),
            Message::user(prompts::worker_user_prompt(
                &assignment.subtask,
                assignment.file_tree.as_deref(),
                &assignment.sibling_context,
            )),
        ];
        let definitions = self.registry.definitions();
        let options = ChatOptions {
            limiter: Some(self.limiter.clone()),
            ..ChatOptions::default()
        };

        for iteration in 0..self.max_tool_loops {
            let (tx, mut rx) = mpsc::channel::<String>(64);
            let bus = self.bus.clone();
            let worker_index = self.index;
            let forwarder = tokio::spawn(async move {
                while let Some(content) = rx.recv().await {
                    bus.emit(SwarmEvent::WorkerToken {
                        worker: worker_index,
                        content,
                    });
                }
            });

            let response = self
                .client
                .chat_completion_stream(&messages, Some(&definitions), tx, &options)
                .await;
            let _ = forwarder.await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(worker = self.index, subtask = %subtask_id, error = %e, "LLM call failed");
                    return self.failed(&subtask_id, &artifacts, e.to_string());
                }
            };

            // No tool calls: the assistant's text is the final summary.
            if response.tool_calls.is_empty() {
                let summary = response.content.unwrap_or_default();
                if summary.trim().is_empty() {
                    return self.failed(&subtask_id, &artifacts, "empty response from model");
                }
                return WorkerResult {
                    subtask_id,
                    status: WorkerStatus::Completed,
                    summary,
                    artifacts: drain(&artifacts),
                    error: None,
                };
            }

            debug!(
                worker = self.index,
                iteration,
                tool_calls = response.tool_calls.len(),
                "executing tool calls"
            );
            messages.push(Message::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                self.bus.emit(SwarmEvent::SubtaskProgress {
                    subtask_id: subtask_id.clone(),
                    worker: self.index,
                    tool: call.function.name.clone(),
                });

                let args = call.parsed_arguments();
                let mut result = self
                    .registry
                    .execute(&call.function.name, &tool_ctx, args.clone())
                    .await;
                if !result.success {
                    // One transparent retry; a second failure goes back to
                    // the model as the tool result so it can adapt.
                    result = self
                        .registry
                        .execute(&call.function.name, &tool_ctx, args)
                        .await;
                }
                messages.push(Message::tool(call.id.clone(), result.into_message()));
            }
        }

        warn!(worker = self.index, subtask = %subtask_id, "tool loop budget exhausted");
        self.failed(&subtask_id, &artifacts, "max_iterations")
    }

    fn failed(
        &self,
        subtask_id: &str,
        artifacts: &Arc<Mutex<Vec<String>>>,
        error: impl Into<String>,
    ) -> WorkerResult {
        let error = error.into();
        WorkerResult {
            subtask_id: subtask_id.to_string(),
            status: WorkerStatus::Failed,
            summary: error.clone(),
            artifacts: drain(artifacts),
            error: Some(error),
        }
    }
}

fn drain(artifacts: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    artifacts.lock().unwrap_or_else(|e| e.into_inner()).clone()
}
