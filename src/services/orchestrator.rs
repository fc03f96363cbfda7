//! Orchestrator Loop
//!
//! The control loop of a build: plan, dispatch ready subtasks to the
//! worker pool, apply results, review, verify, final-review. Iteration is
//! bounded; a build that hits the bound checkpoints and returns so a later
//! resume can pick it up.
//!
//! Subtasks are mutated only between batch execution and the next
//! dispatch, never while workers are running. Iteration N+1 sees every
//! state change from iteration N.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use swarm_core::json_salvage::salvage;
use swarm_core::{
    EventBus, FileLocks, OrchestratorPhase, SharedConfig, SwarmError, SwarmEvent, SwarmResult,
};
use swarm_llm::{ChatOptions, LlmClient, Message};
use swarm_tools::ToolRegistry;

use crate::models::{
    DecisionsPayload, FinalReview, FinalStatus, PlanPayload, PlannedSubtask, ProjectContext,
    SubtaskStatus, WorkerResult,
};
use crate::services::analyzer::analyze_project;
use crate::services::checkpoint;
use crate::services::context_manager::ContextManager;
use crate::services::prompts;
use crate::services::task_manager::TaskManager;
use crate::services::verifier::ProjectVerifier;
use crate::services::worker::{Worker, WorkerAssignment};

/// Extra attempts when the orchestrator reply is empty or not JSON.
const JSON_RETRIES: u32 = 2;

/// How a bounded build ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// The final review declared the project done.
    Done { summary: String },
    /// `max_orch_iterations` was reached; the checkpoint remains on disk
    /// for a later resume.
    IterationLimitReached,
}

pub struct Orchestrator {
    config: SharedConfig,
    client: Arc<LlmClient>,
    registry: Arc<ToolRegistry>,
    file_locks: Arc<FileLocks>,
    bus: Arc<EventBus>,
    verifier: Arc<dyn ProjectVerifier>,
    task_manager: TaskManager,
    context_manager: ContextManager,
}

impl Orchestrator {
    pub fn new(
        config: SharedConfig,
        client: Arc<LlmClient>,
        registry: Arc<ToolRegistry>,
        file_locks: Arc<FileLocks>,
        bus: Arc<EventBus>,
        verifier: Arc<dyn ProjectVerifier>,
    ) -> Self {
        let max_attempts = config.snapshot().max_attempts;
        Self {
            config,
            client,
            registry,
            file_locks,
            bus,
            verifier,
            task_manager: TaskManager::new(max_attempts),
            context_manager: ContextManager::new(),
        }
    }

    /// Run a build to completion (or to the iteration bound). If the
    /// context already has subtasks, this is a resume: planning is skipped
    /// and a synthetic status message re-seeds the conversation.
    pub async fn run(&self, ctx: &mut ProjectContext) -> SwarmResult<BuildOutcome> {
        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::Executing,
        });

        let resuming = !ctx.subtasks.is_empty();
        if ctx.orchestrator_messages.is_empty() {
            ctx.orchestrator_messages
                .push(Message::system(prompts::orchestrator_system_prompt(
                    &ctx.task_description,
                    &ctx.root_dir.display().to_string(),
                )));
        }

        if resuming {
            info!(subtasks = ctx.subtasks.len(), "resuming from checkpoint");
            let status = self.task_manager.status_summary(ctx);
            ctx.orchestrator_messages
                .push(Message::user(prompts::resume_message(&status)));
        } else {
            self.plan(ctx).await?;
        }

        self.main_loop(ctx).await
    }

    /// Continuation mode: after a successful build, plan and execute a
    /// change request alongside the existing completed subtasks.
    pub async fn continue_build(
        &self,
        ctx: &mut ProjectContext,
        change_request: &str,
    ) -> SwarmResult<BuildOutcome> {
        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::Executing,
        });

        ctx.orchestrator_messages.clear();
        ctx.orchestrator_messages
            .push(Message::system(prompts::orchestrator_system_prompt(
                &ctx.task_description,
                &ctx.root_dir.display().to_string(),
            )));

        let status = self.task_manager.status_summary(ctx);
        let prompt = prompts::continuation_message(change_request, &status);
        let plan = self.ask_plan(ctx, prompt).await?;
        if plan.is_empty() {
            let message = "continuation produced no subtasks".to_string();
            self.bus.emit(SwarmEvent::ProjectError {
                message: message.clone(),
            });
            return Err(SwarmError::plan_rejected(message));
        }

        let ids = self.task_manager.add_more_subtasks(ctx, &plan);
        info!(new_subtasks = ids.len(), "continuation planned");
        self.bus.emit(SwarmEvent::OrchestratorPlan {
            subtask_count: ids.len(),
        });
        checkpoint::save(ctx).await?;

        self.main_loop(ctx).await
    }

    // ── Phase 1: planning ────────────────────────────────────────────

    async fn plan(&self, ctx: &mut ProjectContext) -> SwarmResult<()> {
        let analysis = analyze_project(&ctx.root_dir);
        if ctx.project_file_tree.is_none() && !analysis.is_empty_project() {
            ctx.project_file_tree = Some(analysis.file_tree.clone());
        }

        let prompt = prompts::planning_prompt(
            &ctx.task_description,
            Some(&analysis),
            ctx.planning_context.as_deref(),
        );
        let plan = self.ask_plan(ctx, prompt).await?;
        if plan.is_empty() {
            let message = "planner returned no subtasks".to_string();
            self.bus.emit(SwarmEvent::ProjectError {
                message: message.clone(),
            });
            return Err(SwarmError::plan_rejected(message));
        }

        let ids = self.task_manager.add_subtasks_from_plan(ctx, &plan);
        info!(subtasks = ids.len(), "plan accepted");
        self.bus.emit(SwarmEvent::OrchestratorPlan {
            subtask_count: ids.len(),
        });
        checkpoint::save(ctx).await?;
        Ok(())
    }

    // ── Phases 2+: the main loop ─────────────────────────────────────

    async fn main_loop(&self, ctx: &mut ProjectContext) -> SwarmResult<BuildOutcome> {
        let config = self.config.snapshot();
        let workers: Vec<Arc<Worker>> = (0..config.worker_count)
            .map(|index| {
                Arc::new(Worker::new(
                    index,
                    self.client.clone(),
                    self.registry.clone(),
                    self.file_locks.clone(),
                    self.bus.clone(),
                    &config,
                ))
            })
            .collect();

        for iteration in 1..=config.max_orch_iterations {
            let completed = ctx
                .subtasks
                .iter()
                .filter(|s| s.status == SubtaskStatus::Completed)
                .count();
            self.bus.emit(SwarmEvent::OrchestratorIteration {
                iteration,
                completed,
                total: ctx.subtasks.len(),
            });

            // A permanently failed subtask ends the build even if other
            // subtasks are still ready: the reviewer cannot un-fail it.
            if self.task_manager.any_failed(ctx) {
                let failed = self.task_manager.failed_titles(ctx).join(", ");
                let message = format!("subtasks failed after max attempts: {}", failed);
                self.bus.emit(SwarmEvent::ProjectError {
                    message: message.clone(),
                });
                return Err(SwarmError::subtasks_failed(message));
            }

            let ready = self.task_manager.get_ready_subtasks(ctx);
            if ready.is_empty() {
                if self.task_manager.all_completed(ctx) {
                    match self.verify_and_finalize(ctx).await? {
                        Some(outcome) => return Ok(outcome),
                        None => continue,
                    }
                }
                let message = "no subtask is ready and the project is not complete \
                               (unresolvable dependencies)"
                    .to_string();
                self.bus.emit(SwarmEvent::ProjectError {
                    message: message.clone(),
                });
                return Err(SwarmError::deadlock(message));
            }

            let batch = self.dispatch(ctx, &workers, ready).await;

            for result in &batch.results {
                self.task_manager.apply_worker_result(ctx, result);
                let status = ctx
                    .subtask(&result.subtask_id)
                    .map(|s| s.status.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                self.bus.emit(SwarmEvent::SubtaskCompleted {
                    subtask_id: result.subtask_id.clone(),
                    status,
                });
            }
            checkpoint::save(ctx).await?;

            self.review(ctx, &batch.ids).await?;
            checkpoint::save(ctx).await?;

            if self.context_manager.over_half_budget(&ctx.orchestrator_messages) {
                warn!("orchestrator context is over half of its budget");
            }
        }

        warn!("orchestrator iteration limit reached; checkpoint retained for resume");
        checkpoint::save(ctx).await?;
        Ok(BuildOutcome::IterationLimitReached)
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    async fn dispatch(
        &self,
        ctx: &mut ProjectContext,
        workers: &[Arc<Worker>],
        ready: Vec<String>,
    ) -> Batch {
        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::Dispatching,
        });

        let batch_ids: Vec<String> = ready.into_iter().take(workers.len()).collect();

        let mut assignments = Vec::new();
        for (slot, id) in batch_ids.iter().enumerate() {
            let sibling_context = prompts::sibling_context(ctx, id);
            let Some(subtask) = ctx.subtask_mut(id) else {
                continue;
            };
            let subtask = {
                subtask.status = SubtaskStatus::InProgress;
                subtask.assigned_worker = Some(slot);
                subtask.clone()
            };
            self.bus.emit(SwarmEvent::SubtaskAssigned {
                subtask_id: id.clone(),
                worker: slot,
            });
            assignments.push(WorkerAssignment {
                subtask,
                project_root: ctx.root_dir.clone(),
                file_tree: ctx.project_file_tree.clone(),
                sibling_context,
            });
        }

        info!(batch = batch_ids.len(), "dispatching batch");
        let mut handles = Vec::new();
        for assignment in assignments {
            let worker = workers[assignment.subtask.assigned_worker.unwrap_or(0)].clone();
            handles.push((
                assignment.subtask.id.clone(),
                tokio::spawn(async move { worker.run(assignment).await }),
            ));
        }

        // Wait for the whole batch to settle; never short-circuit on the
        // first completion. A panicked worker task becomes a failed result.
        let mut results = Vec::new();
        for (subtask_id, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    warn!(subtask = %subtask_id, error = %join_error, "worker task panicked");
                    results.push(WorkerResult::failed(
                        subtask_id,
                        format!("worker crashed: {}", join_error),
                    ));
                }
            }
        }

        Batch {
            ids: batch_ids,
            results,
        }
    }

    // ── Review ───────────────────────────────────────────────────────

    async fn review(&self, ctx: &mut ProjectContext, batch_ids: &[String]) -> SwarmResult<()> {
        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::Reviewing,
        });

        let status = self.task_manager.status_summary(ctx);
        let prompt = prompts::review_prompt(ctx, batch_ids, &status);
        let decisions = self
            .ask_orchestrator::<DecisionsPayload>(ctx, prompt)
            .await?
            .into_decisions();

        let (accepted, revised, reassigned) =
            self.task_manager.apply_review_decisions(ctx, &decisions);
        info!(accepted, revised, reassigned, "review applied");
        self.bus.emit(SwarmEvent::OrchestratorReview {
            accepted,
            revised,
            reassigned,
        });
        Ok(())
    }

    // ── Verification and final review ────────────────────────────────

    /// Returns `Some(outcome)` to stop the build, `None` to continue the
    /// main loop (fix subtasks or additional subtasks were queued).
    async fn verify_and_finalize(
        &self,
        ctx: &mut ProjectContext,
    ) -> SwarmResult<Option<BuildOutcome>> {
        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::Verifying,
        });
        let report = self.verifier.verify(&ctx.root_dir).await;

        if !report.passed {
            info!("verification failed; planning fixes");
            let prompt = prompts::verifier_fix_prompt(&report);
            let plan = self.ask_plan(ctx, prompt).await?;
            if !plan.is_empty() {
                let ids = self.task_manager.add_more_subtasks(ctx, &plan);
                self.bus.emit(SwarmEvent::OrchestratorPlan {
                    subtask_count: ids.len(),
                });
                checkpoint::save(ctx).await?;
                return Ok(None);
            }
            // The model saw the report and planned nothing; let the final
            // review make the call on the failing report.
            warn!("verifier failed but no fix subtasks were planned");
        }

        self.bus.emit(SwarmEvent::OrchestratorPhase {
            phase: OrchestratorPhase::FinalReview,
        });
        let status = self.task_manager.status_summary(ctx);
        let prompt = prompts::final_review_prompt(&status, &report);
        let review = self.ask_orchestrator::<FinalReview>(ctx, prompt).await?;

        match review.status {
            FinalStatus::Done => {
                checkpoint::save(ctx).await?;
                self.bus.emit(SwarmEvent::ProjectDone {
                    summary: review.summary.clone(),
                });
                Ok(Some(BuildOutcome::Done {
                    summary: review.summary,
                }))
            }
            FinalStatus::NeedsMore => {
                if review.additional_subtasks.is_empty() {
                    // Nothing actionable was proposed; treat as done rather
                    // than spinning on verify/final-review forever.
                    warn!("final review said needs_more without subtasks; finishing");
                    self.bus.emit(SwarmEvent::ProjectDone {
                        summary: review.summary.clone(),
                    });
                    return Ok(Some(BuildOutcome::Done {
                        summary: review.summary,
                    }));
                }
                let ids = self
                    .task_manager
                    .add_more_subtasks(ctx, &review.additional_subtasks);
                info!(additional = ids.len(), "final review requested more work");
                self.bus.emit(SwarmEvent::OrchestratorPlan {
                    subtask_count: ids.len(),
                });
                checkpoint::save(ctx).await?;
                Ok(None)
            }
        }
    }

    // ── LLM helpers ──────────────────────────────────────────────────

    async fn ask_plan(
        &self,
        ctx: &mut ProjectContext,
        prompt: String,
    ) -> SwarmResult<Vec<PlannedSubtask>> {
        Ok(self
            .ask_orchestrator::<PlanPayload>(ctx, prompt)
            .await?
            .into_subtasks())
    }

    /// Append the prompt, summarize the conversation if needed, call the
    /// LLM, and salvage a typed JSON value from the reply. Empty or
    /// unparseable replies get a reminder and a bounded retry; every
    /// assistant reply is appended to the conversation either way.
    async fn ask_orchestrator<T: DeserializeOwned>(
        &self,
        ctx: &mut ProjectContext,
        prompt: String,
    ) -> SwarmResult<T> {
        ctx.orchestrator_messages.push(Message::user(prompt));

        for attempt in 0..=JSON_RETRIES {
            self.context_manager
                .compact_if_needed(&self.client, &mut ctx.orchestrator_messages)
                .await;

            let response = self
                .client
                .chat_completion(&ctx.orchestrator_messages, None, &ChatOptions::default())
                .await?;
            let content = response.content.unwrap_or_default();
            ctx.orchestrator_messages
                .push(Message::assistant(content.clone()));

            if !content.trim().is_empty() {
                if let Some(parsed) = salvage::<T>(&content) {
                    return Ok(parsed);
                }
            }

            if attempt < JSON_RETRIES {
                warn!(attempt, "orchestrator reply was not valid JSON; retrying");
                ctx.orchestrator_messages.push(Message::user(
                    "Your response was not valid JSON. Respond with ONLY valid JSON.",
                ));
            }
        }

        Err(SwarmError::llm(
            "orchestrator did not produce valid JSON after retries",
        ))
    }
}

struct Batch {
    ids: Vec<String>,
    results: Vec<WorkerResult>,
}
