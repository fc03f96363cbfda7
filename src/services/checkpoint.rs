//! Checkpointing
//!
//! Persists subtask state to a well-known file at the project root so an
//! interrupted or iteration-capped build can be resumed later. The
//! orchestrator conversation is deliberately not persisted; on resume it is
//! rebuilt from a fresh system prompt plus a synthetic status message.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use swarm_core::SwarmResult;

use crate::models::{ProjectContext, Subtask, SubtaskStatus};

/// Checkpoint file name, relative to the project root.
pub const CHECKPOINT_FILE: &str = ".swarm-checkpoint.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub root_dir: std::path::PathBuf,
    pub task_description: String,
    pub subtasks: Vec<Subtask>,
    pub saved_at: String,
}

impl Checkpoint {
    /// Rebuild a project context from this checkpoint. The conversation
    /// starts empty; the orchestrator injects the resume message itself.
    pub fn into_project_context(self) -> ProjectContext {
        let mut ctx = ProjectContext::new(self.root_dir, self.task_description);
        ctx.id = self.id;
        ctx.subtasks = self.subtasks;
        ctx
    }
}

/// Write the current subtask state to `<root>/.swarm-checkpoint.json`.
pub async fn save(ctx: &ProjectContext) -> SwarmResult<()> {
    let checkpoint = Checkpoint {
        id: ctx.id.clone(),
        root_dir: ctx.root_dir.clone(),
        task_description: ctx.task_description.clone(),
        subtasks: ctx.subtasks.clone(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    };
    let content = serde_json::to_string_pretty(&checkpoint)?;
    let path = ctx.root_dir.join(CHECKPOINT_FILE);
    tokio::fs::write(&path, content).await?;
    debug!(path = %path.display(), subtasks = checkpoint.subtasks.len(), "checkpoint saved");
    Ok(())
}

/// Load the checkpoint from a project root. Absent or invalid files load
/// as `None`. Any subtask found `in_progress` was interrupted and is
/// demoted to `pending`.
pub async fn load(root_dir: &Path) -> Option<Checkpoint> {
    let path = root_dir.join(CHECKPOINT_FILE);
    let content = tokio::fs::read_to_string(&path).await.ok()?;
    let mut checkpoint: Checkpoint = match serde_json::from_str(&content) {
        Ok(checkpoint) => checkpoint,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring invalid checkpoint");
            return None;
        }
    };

    for subtask in &mut checkpoint.subtasks {
        if subtask.status == SubtaskStatus::InProgress {
            subtask.status = SubtaskStatus::Pending;
        }
    }
    Some(checkpoint)
}
