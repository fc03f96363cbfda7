//! write_file Tool
//!
//! Writes content to a file under the project root, creating parent
//! directories as needed. Takes the per-path lock so concurrent workers
//! never interleave writes, and records the path as an artifact.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use swarm_llm::ParameterSchema;

use crate::path_guard::{relative_display, resolve_in_root};
use crate::trait_def::{Tool, ToolContext, ToolResult};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does. Creates parent directories as needed."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ParameterSchema::string(Some("Path relative to the project root")),
        );
        properties.insert(
            "content".to_string(),
            ParameterSchema::string(Some("The full content to write")),
        );
        ParameterSchema::object(
            None,
            properties,
            vec!["path".to_string(), "content".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: path");
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: content");
        };

        let resolved = match resolve_in_root(&ctx.project_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        let relative = relative_display(&ctx.project_root, &resolved);

        ctx.file_locks.acquire(&relative, ctx.worker_index).await;
        let result = write_file(&resolved, content).await;
        ctx.file_locks.release(&relative);

        match result {
            Ok(()) => {
                ctx.record_artifact(&relative);
                ToolResult::ok(format!(
                    "Wrote {} bytes ({} lines) to {}",
                    content.len(),
                    content.lines().count(),
                    relative
                ))
            }
            Err(e) => ToolResult::err(format!("Failed to write '{}': {}", relative, e)),
        }
    }
}

async fn write_file(path: &std::path::Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await
}
