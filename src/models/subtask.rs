//! Subtask Model
//!
//! The central unit of work: planned by the orchestrator, executed by one
//! worker, reviewed by the orchestrator. Subtasks are created by the task
//! manager, mutated only by it, and never deleted; completed subtasks stay
//! visible to later subtasks as sibling context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Worker summaries are truncated to this many characters at storage time
/// to bound context growth.
pub const RESULT_CHAR_CAP: usize = 2000;

/// Lifecycle state of a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::InProgress => write!(f, "in_progress"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One planned unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Ids of sibling subtasks that must be completed first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Worker slot this subtask is (or was last) assigned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<usize>,
    pub status: SubtaskStatus,
    /// Last worker summary, truncated to [`RESULT_CHAR_CAP`] at storage time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Relative file paths this subtask produced, append-only across retries
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Completed tries, successful or failed
    #[serde(default)]
    pub attempts: u32,
    /// Reviewer guidance for the next attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Subtask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            dependencies: Vec::new(),
            assigned_worker: None,
            status: SubtaskStatus::Pending,
            result: None,
            artifacts: Vec::new(),
            attempts: 0,
            feedback: None,
        }
    }
}

/// Outcome of one worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Completed,
    Failed,
}

/// What a worker hands back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub subtask_id: String,
    pub status: WorkerStatus,
    pub summary: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn failed(subtask_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            subtask_id: subtask_id.into(),
            status: WorkerStatus::Failed,
            summary: error.clone(),
            artifacts: Vec::new(),
            error: Some(error),
        }
    }
}

/// Reviewer verdict for one subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewVerdict {
    Accept,
    Revise,
    Reassign,
}

/// One review decision parsed from the orchestrator LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub subtask_id: String,
    pub verdict: ReviewVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// A subtask as the planner LLM describes it. Dependency tokens may be
/// titles or numeric indexes; the task manager resolves them.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedSubtask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<serde_json::Value>,
}

/// Plans arrive either as `{"subtasks": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PlanPayload {
    Wrapped { subtasks: Vec<PlannedSubtask> },
    Bare(Vec<PlannedSubtask>),
}

impl PlanPayload {
    pub fn into_subtasks(self) -> Vec<PlannedSubtask> {
        match self {
            PlanPayload::Wrapped { subtasks } => subtasks,
            PlanPayload::Bare(subtasks) => subtasks,
        }
    }
}

/// Review decisions arrive either wrapped or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DecisionsPayload {
    Wrapped { decisions: Vec<ReviewDecision> },
    Bare(Vec<ReviewDecision>),
}

impl DecisionsPayload {
    pub fn into_decisions(self) -> Vec<ReviewDecision> {
        match self {
            DecisionsPayload::Wrapped { decisions } => decisions,
            DecisionsPayload::Bare(decisions) => decisions,
        }
    }
}

/// Terminal state of the final review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Done,
    NeedsMore,
}

/// The orchestrator's final-review reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReview {
    pub status: FinalStatus,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub additional_subtasks: Vec<PlannedSubtask>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtask_serialization_is_camel_case() {
        let mut subtask = Subtask::new("Build API", "Create the REST API");
        subtask.assigned_worker = Some(1);
        subtask.feedback = Some("add tests".to_string());

        let json = serde_json::to_string(&subtask).unwrap();
        assert!(json.contains("\"assignedWorker\":1"));
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"feedback\":\"add tests\""));

        let parsed: Subtask = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, "Build API");
        assert_eq!(parsed.assigned_worker, Some(1));
    }

    #[test]
    fn test_subtask_ids_unique() {
        let a = Subtask::new("a", "");
        let b = Subtask::new("a", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_plan_payload_both_shapes() {
        let wrapped: PlanPayload =
            serde_json::from_str(r#"{"subtasks": [{"title": "A"}]}"#).unwrap();
        assert_eq!(wrapped.into_subtasks().len(), 1);

        let bare: PlanPayload = serde_json::from_str(r#"[{"title": "A"}, {"title": "B"}]"#).unwrap();
        assert_eq!(bare.into_subtasks().len(), 2);
    }

    #[test]
    fn test_decisions_payload_both_shapes() {
        let wrapped: DecisionsPayload = serde_json::from_str(
            r#"{"decisions": [{"subtaskId": "x", "verdict": "accept"}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_decisions().len(), 1);

        let bare: DecisionsPayload =
            serde_json::from_str(r#"[{"subtaskId": "x", "verdict": "revise", "feedback": "fix"}]"#)
                .unwrap();
        let decisions = bare.into_decisions();
        assert_eq!(decisions[0].verdict, ReviewVerdict::Revise);
        assert_eq!(decisions[0].feedback.as_deref(), Some("fix"));
    }

    #[test]
    fn test_final_review_parsing() {
        let done: FinalReview =
            serde_json::from_str(r#"{"status": "done", "summary": "all good"}"#).unwrap();
        assert_eq!(done.status, FinalStatus::Done);
        assert!(done.additional_subtasks.is_empty());

        let more: FinalReview = serde_json::from_str(
            r#"{"status": "needs_more", "summary": "missing tests", "additionalSubtasks": [{"title": "Add tests"}]}"#,
        )
        .unwrap();
        assert_eq!(more.status, FinalStatus::NeedsMore);
        assert_eq!(more.additional_subtasks.len(), 1);
    }

    #[test]
    fn test_planned_subtask_mixed_dependency_tokens() {
        let planned: PlannedSubtask = serde_json::from_str(
            r#"{"title": "C", "description": "", "dependencies": ["A", 1]}"#,
        )
        .unwrap();
        assert_eq!(planned.dependencies.len(), 2);
    }
}
