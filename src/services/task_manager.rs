//! Task Manager
//!
//! Owns every mutation rule for subtasks: plan intake with dependency
//! token resolution, the ready-set computation, worker result application,
//! and review decision application. Nothing else mutates a subtask.
//!
//! Attempt accounting: a failed worker run is counted when its result is
//! applied; a successful run is counted when the reviewer rules on it
//! (accept or revise). Reassign moves work without counting a try.

use std::collections::HashMap;

use tracing::debug;

use swarm_core::text::truncate_chars;

use crate::models::{
    PlannedSubtask, ProjectContext, ReviewDecision, ReviewVerdict, Subtask, SubtaskStatus,
    WorkerResult, WorkerStatus, RESULT_CHAR_CAP,
};

pub struct TaskManager {
    max_attempts: u32,
}

impl TaskManager {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Create subtasks from a plan, resolving each dependency token in
    /// order: (a) another title within the same plan (excluding self),
    /// (b) an existing subtask title in the context, (c) a numeric
    /// (0-based) index into the plan. Unresolved tokens are dropped, so
    /// the model can speak by title or by ordinal without breaking the
    /// graph.
    ///
    /// Returns the ids of the created subtasks, in plan order.
    pub fn add_subtasks_from_plan(
        &self,
        ctx: &mut ProjectContext,
        plan: &[PlannedSubtask],
    ) -> Vec<String> {
        // Titles of subtasks that existed before this plan
        let existing_titles: HashMap<String, String> = ctx
            .subtasks
            .iter()
            .map(|subtask| (normalize_title(&subtask.title), subtask.id.clone()))
            .collect();

        let created: Vec<Subtask> = plan
            .iter()
            .map(|planned| Subtask::new(planned.title.clone(), planned.description.clone()))
            .collect();
        let plan_ids: Vec<String> = created.iter().map(|subtask| subtask.id.clone()).collect();

        let mut resolved_subtasks = created;
        for (index, planned) in plan.iter().enumerate() {
            let mut dependencies = Vec::new();
            for token in &planned.dependencies {
                let resolved = resolve_dependency_token(
                    token,
                    index,
                    plan,
                    &plan_ids,
                    &existing_titles,
                );
                match resolved {
                    Some(id) => dependencies.push(id),
                    None => debug!(token = %token, subtask = %planned.title, "dropping unresolved dependency token"),
                }
            }
            resolved_subtasks[index].dependencies = dependencies;
        }

        ctx.subtasks.extend(resolved_subtasks);
        plan_ids
    }

    /// Append a mid-build mini-plan (verifier fixes, final-review
    /// additions). Same resolution rules as the initial plan.
    pub fn add_more_subtasks(
        &self,
        ctx: &mut ProjectContext,
        plan: &[PlannedSubtask],
    ) -> Vec<String> {
        self.add_subtasks_from_plan(ctx, plan)
    }

    /// Ids of subtasks that are pending with every dependency completed.
    /// Dependency ids that do not resolve to an existing subtask are
    /// ignored.
    pub fn get_ready_subtasks(&self, ctx: &ProjectContext) -> Vec<String> {
        ctx.subtasks
            .iter()
            .filter(|subtask| subtask.status == SubtaskStatus::Pending)
            .filter(|subtask| {
                subtask.dependencies.iter().all(|dep_id| {
                    match ctx.subtask(dep_id) {
                        Some(dep) => dep.status == SubtaskStatus::Completed,
                        None => true,
                    }
                })
            })
            .map(|subtask| subtask.id.clone())
            .collect()
    }

    /// Record what a worker produced. Summaries are truncated at storage
    /// time; artifacts are appended even for failed attempts (they are the
    /// best diagnostics for the retry). A completed result is tentative:
    /// the subsequent review may send the subtask back to pending.
    pub fn apply_worker_result(&self, ctx: &mut ProjectContext, result: &WorkerResult) {
        let max_attempts = self.max_attempts;
        let Some(subtask) = ctx.subtask_mut(&result.subtask_id) else {
            debug!(subtask_id = %result.subtask_id, "worker result for unknown subtask");
            return;
        };

        subtask.result = Some(truncate_chars(&result.summary, RESULT_CHAR_CAP));
        subtask
            .artifacts
            .extend(result.artifacts.iter().cloned());

        match result.status {
            WorkerStatus::Completed => {
                subtask.status = SubtaskStatus::Completed;
            }
            WorkerStatus::Failed => {
                subtask.attempts += 1;
                if subtask.attempts >= max_attempts {
                    subtask.status = SubtaskStatus::Failed;
                } else {
                    subtask.status = SubtaskStatus::Pending;
                    subtask.feedback = Some(
                        result
                            .error
                            .clone()
                            .unwrap_or_else(|| result.summary.clone()),
                    );
                }
            }
        }
    }

    /// Apply reviewer verdicts. Returns (accepted, revised, reassigned)
    /// counts for progress reporting.
    pub fn apply_review_decisions(
        &self,
        ctx: &mut ProjectContext,
        decisions: &[ReviewDecision],
    ) -> (usize, usize, usize) {
        let max_attempts = self.max_attempts;
        let mut accepted = 0;
        let mut revised = 0;
        let mut reassigned = 0;

        for decision in decisions {
            let Some(subtask) = ctx.subtask_mut(&decision.subtask_id) else {
                debug!(subtask_id = %decision.subtask_id, "review decision for unknown subtask");
                continue;
            };

            match decision.verdict {
                ReviewVerdict::Accept => {
                    subtask.status = SubtaskStatus::Completed;
                    subtask.attempts += 1;
                    accepted += 1;
                }
                ReviewVerdict::Revise => {
                    subtask.attempts += 1;
                    subtask.feedback = decision.feedback.clone();
                    if subtask.attempts >= max_attempts {
                        subtask.status = SubtaskStatus::Failed;
                    } else {
                        subtask.status = SubtaskStatus::Pending;
                    }
                    revised += 1;
                }
                ReviewVerdict::Reassign => {
                    // Work moves to another worker without counting a try,
                    // but a subtask at the cap can no longer go pending.
                    subtask.assigned_worker = None;
                    subtask.feedback = decision.feedback.clone();
                    if subtask.attempts >= max_attempts {
                        subtask.status = SubtaskStatus::Failed;
                    } else {
                        subtask.status = SubtaskStatus::Pending;
                    }
                    reassigned += 1;
                }
            }
        }

        (accepted, revised, reassigned)
    }

    pub fn all_completed(&self, ctx: &ProjectContext) -> bool {
        ctx.subtasks
            .iter()
            .all(|subtask| subtask.status == SubtaskStatus::Completed)
    }

    /// Whether any subtask has failed permanently (at the attempt cap).
    pub fn any_failed(&self, ctx: &ProjectContext) -> bool {
        ctx.subtasks.iter().any(|subtask| {
            subtask.status == SubtaskStatus::Failed && subtask.attempts >= self.max_attempts
        })
    }

    pub fn failed_titles(&self, ctx: &ProjectContext) -> Vec<String> {
        ctx.subtasks
            .iter()
            .filter(|subtask| subtask.status == SubtaskStatus::Failed)
            .map(|subtask| subtask.title.clone())
            .collect()
    }

    /// Human-readable project status, used both for display and as context
    /// in the next orchestrator prompt.
    pub fn status_summary(&self, ctx: &ProjectContext) -> String {
        let total = ctx.subtasks.len();
        let completed = ctx
            .subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Completed)
            .count();
        let failed = ctx
            .subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Failed)
            .count();

        let mut summary = format!(
            "Project status: {}/{} subtasks completed, {} failed\n",
            completed, total, failed
        );
        for subtask in &ctx.subtasks {
            summary.push_str(&format!(
                "- [{}] {} (attempts: {})",
                subtask.status, subtask.title, subtask.attempts
            ));
            if let Some(worker) = subtask.assigned_worker {
                summary.push_str(&format!(" [worker {}]", worker));
            }
            summary.push('\n');
            if let Some(result) = &subtask.result {
                summary.push_str(&format!("    result: {}\n", truncate_chars(result, 200)));
            }
            if !subtask.artifacts.is_empty() {
                summary.push_str(&format!(
                    "    artifacts: {}\n",
                    subtask.artifacts.join(", ")
                ));
            }
        }
        summary
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Resolve one dependency token from the plan.
fn resolve_dependency_token(
    token: &serde_json::Value,
    self_index: usize,
    plan: &[PlannedSubtask],
    plan_ids: &[String],
    existing_titles: &HashMap<String, String>,
) -> Option<String> {
    if let Some(text) = token.as_str() {
        let normalized = normalize_title(text);

        // (a) another title within the same plan
        for (index, planned) in plan.iter().enumerate() {
            if index != self_index && normalize_title(&planned.title) == normalized {
                return Some(plan_ids[index].clone());
            }
        }
        // (b) an existing subtask title
        if let Some(id) = existing_titles.get(&normalized) {
            return Some(id.clone());
        }
        // (c) a numeric index written as a string
        if let Ok(index) = normalized.parse::<usize>() {
            return index_to_id(index, self_index, plan_ids);
        }
        return None;
    }

    if let Some(index) = token.as_u64() {
        return index_to_id(index as usize, self_index, plan_ids);
    }

    None
}

fn index_to_id(index: usize, self_index: usize, plan_ids: &[String]) -> Option<String> {
    if index < plan_ids.len() && index != self_index {
        Some(plan_ids[index].clone())
    } else {
        None
    }
}
