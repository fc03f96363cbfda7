//! Project Context
//!
//! Exclusive owner of the subtask collection and the orchestrator
//! conversation for one build. The task manager mutates subtasks through a
//! borrowed reference; workers only ever see read-only sibling snapshots
//! plus their own artifact list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use swarm_llm::Message;

use super::subtask::Subtask;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub id: String,
    pub root_dir: PathBuf,
    pub task_description: String,
    /// Insertion-ordered; id is the key
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    /// The running orchestrator conversation. Never persisted; rebuilt from
    /// a fresh system prompt on resume.
    #[serde(skip)]
    pub orchestrator_messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_file_tree: Option<String>,
    /// Context carried over from the interactive planner, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_context: Option<String>,
}

impl ProjectContext {
    pub fn new(root_dir: impl Into<PathBuf>, task_description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            root_dir: root_dir.into(),
            task_description: task_description.into(),
            subtasks: Vec::new(),
            orchestrator_messages: Vec::new(),
            project_file_tree: None,
            planning_context: None,
        }
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|subtask| subtask.id == id)
    }

    pub fn subtask_mut(&mut self, id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|subtask| subtask.id == id)
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }
}
