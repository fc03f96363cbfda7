//! list_directory Tool

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use swarm_llm::ParameterSchema;

use crate::path_guard::resolve_in_root;
use crate::trait_def::{Tool, ToolContext, ToolResult};

const MAX_ENTRIES: usize = 200;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are marked with a trailing slash."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ParameterSchema::string(Some(
                "Directory path relative to the project root (defaults to the root)",
            )),
        );
        ParameterSchema::object(None, properties, vec![])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = match resolve_in_root(&ctx.project_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        let mut read_dir = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => return ToolResult::err(format!("Failed to list '{}': {}", path, e)),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{}/", name) } else { name });
        }
        entries.sort();

        let total = entries.len();
        let mut output = entries
            .into_iter()
            .take(MAX_ENTRIES)
            .collect::<Vec<_>>()
            .join("\n");
        if total > MAX_ENTRIES {
            output.push_str(&format!("\n... ({} more entries)", total - MAX_ENTRIES));
        }
        if output.is_empty() {
            output = "(empty directory)".to_string();
        }

        ToolResult::ok(output)
    }
}
