//! patch_file Tool
//!
//! Exact-match text replacement. The old text must appear exactly once so
//! the model cannot accidentally rewrite the wrong occurrence.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use swarm_llm::ParameterSchema;

use crate::path_guard::{relative_display, resolve_in_root};
use crate::trait_def::{Tool, ToolContext, ToolResult};

pub struct PatchFileTool;

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Replace an exact text snippet in a file. The old_text must match exactly one location; include enough surrounding lines to make it unique."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ParameterSchema::string(Some("Path relative to the project root")),
        );
        properties.insert(
            "old_text".to_string(),
            ParameterSchema::string(Some("Exact text to replace")),
        );
        properties.insert(
            "new_text".to_string(),
            ParameterSchema::string(Some("Replacement text")),
        );
        ParameterSchema::object(
            None,
            properties,
            vec![
                "path".to_string(),
                "old_text".to_string(),
                "new_text".to_string(),
            ],
        )
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: path");
        };
        let Some(old_text) = args.get("old_text").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: old_text");
        };
        let Some(new_text) = args.get("new_text").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: new_text");
        };

        let resolved = match resolve_in_root(&ctx.project_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        let relative = relative_display(&ctx.project_root, &resolved);

        ctx.file_locks.acquire(&relative, ctx.worker_index).await;
        let result = apply_patch(&resolved, old_text, new_text).await;
        ctx.file_locks.release(&relative);

        match result {
            Ok(()) => {
                ctx.record_artifact(&relative);
                ToolResult::ok(format!("Patched {}", relative))
            }
            Err(e) => ToolResult::err(e),
        }
    }
}

async fn apply_patch(
    path: &std::path::Path,
    old_text: &str,
    new_text: &str,
) -> Result<(), String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    let matches = content.matches(old_text).count();
    if matches == 0 {
        return Err("old_text not found in file. Re-read the file and copy the text exactly, including whitespace.".to_string());
    }
    if matches > 1 {
        return Err(format!(
            "old_text matches {} locations. Include more surrounding context to make it unique.",
            matches
        ));
    }

    let patched = content.replacen(old_text, new_text, 1);
    tokio::fs::write(path, patched)
        .await
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trait_def::test_support::make_ctx;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_patch_unique_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn old() {}\nfn keep() {}\n").unwrap();
        let ctx = make_ctx(dir.path());

        let result = PatchFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "a.rs", "old_text": "fn old() {}", "new_text": "fn new() {}"}),
            )
            .await;
        assert!(result.success, "{:?}", result.error);
        let content = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert!(content.contains("fn new() {}"));
        assert!(content.contains("fn keep() {}"));
        assert_eq!(ctx.artifacts.lock().unwrap().as_slice(), ["a.rs"]);
    }

    #[tokio::test]
    async fn test_patch_no_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn x() {}\n").unwrap();
        let ctx = make_ctx(dir.path());

        let result = PatchFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "a.rs", "old_text": "absent", "new_text": "y"}),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_patch_ambiguous_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "x\nx\n").unwrap();
        let ctx = make_ctx(dir.path());

        let result = PatchFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "a.rs", "old_text": "x", "new_text": "y"}),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("more surrounding context"));
    }
}
