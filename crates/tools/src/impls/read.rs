//! read_file Tool
//!
//! Reads a file inside the project root with optional offset/limit,
//! returning line-numbered content.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use swarm_llm::ParameterSchema;

use crate::path_guard::resolve_in_root;
use crate::trait_def::{Tool, ToolContext, ToolResult};

/// Maximum lines returned in one call.
const DEFAULT_LINE_LIMIT: usize = 2000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the project. Returns line-numbered content. Use offset and limit for large files."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ParameterSchema::string(Some("Path relative to the project root")),
        );
        properties.insert(
            "offset".to_string(),
            ParameterSchema::integer(Some("1-based line to start reading from")),
        );
        properties.insert(
            "limit".to_string(),
            ParameterSchema::integer(Some("Maximum number of lines to return")),
        );
        ParameterSchema::object(None, properties, vec!["path".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: path");
        };
        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(1).max(1) as usize;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LINE_LIMIT as u64) as usize;

        let resolved = match resolve_in_root(&ctx.project_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("Failed to read '{}': {}", path, e)),
        };

        let total_lines = content.lines().count();
        let mut output = String::new();
        for (index, line) in content
            .lines()
            .enumerate()
            .skip(offset - 1)
            .take(limit)
        {
            output.push_str(&format!("{:>6}\t{}\n", index + 1, line));
        }

        let last_shown = (offset - 1 + limit).min(total_lines);
        if last_shown < total_lines {
            output.push_str(&format!(
                "... ({} more lines, continue with offset {})\n",
                total_lines - last_shown,
                last_shown + 1
            ));
        }
        if output.is_empty() {
            output = "(empty file)".to_string();
        }

        ToolResult::ok(output)
    }
}
