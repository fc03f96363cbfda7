//! glob_files Tool
//!
//! Finds files matching a glob pattern, gitignore-aware, sorted by
//! modification time (newest first).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::SystemTime;

use globset::GlobBuilder;
use ignore::WalkBuilder;

use swarm_llm::ParameterSchema;

use crate::path_guard::relative_display;
use crate::trait_def::{Tool, ToolContext, ToolResult};

const MAX_RESULTS: usize = 200;

pub struct GlobFilesTool;

#[async_trait]
impl Tool for GlobFilesTool {
    fn name(&self) -> &str {
        "glob_files"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern (e.g. '**/*.ts', 'src/**/*.rs'). Honors .gitignore. Results are sorted by modification time, newest first."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "pattern".to_string(),
            ParameterSchema::string(Some("The glob pattern to match against relative paths")),
        );
        ParameterSchema::object(None, properties, vec!["pattern".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: pattern");
        };

        let glob = match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(g) => g.compile_matcher(),
            Err(e) => return ToolResult::err(format!("Invalid glob pattern: {}", e)),
        };

        let mut matches: Vec<(SystemTime, String)> = Vec::new();
        let walker = WalkBuilder::new(&ctx.project_root)
            .hidden(false)
            .require_git(false)
            .build();
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let relative = relative_display(&ctx.project_root, entry.path());
            if glob.is_match(&relative) {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                matches.push((modified, relative));
            }
        }

        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let total = matches.len();
        let mut output = matches
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(_, path)| path)
            .collect::<Vec<_>>()
            .join("\n");
        if total > MAX_RESULTS {
            output.push_str(&format!("\n... ({} more matches)", total - MAX_RESULTS));
        }
        if output.is_empty() {
            output = format!("No files match '{}'", pattern);
        }

        ToolResult::ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trait_def::test_support::make_ctx;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_glob_matches_recursive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/inner")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "x").unwrap();
        std::fs::write(dir.path().join("src/inner/b.rs"), "x").unwrap();
        std::fs::write(dir.path().join("src/c.txt"), "x").unwrap();
        let ctx = make_ctx(dir.path());

        let result = GlobFilesTool
            .execute(&ctx, serde_json::json!({"pattern": "**/*.rs"}))
            .await;
        let output = result.output.unwrap();
        assert!(output.contains("src/a.rs"));
        assert!(output.contains("src/inner/b.rs"));
        assert!(!output.contains("c.txt"));
    }

    #[tokio::test]
    async fn test_glob_no_matches() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(dir.path());
        let result = GlobFilesTool
            .execute(&ctx, serde_json::json!({"pattern": "*.zig"}))
            .await;
        assert!(result.output.unwrap().contains("No files match"));
    }

    #[tokio::test]
    async fn test_glob_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let ctx = make_ctx(dir.path());
        let result = GlobFilesTool
            .execute(&ctx, serde_json::json!({"pattern": "a{"}))
            .await;
        assert!(!result.success);
    }
}
