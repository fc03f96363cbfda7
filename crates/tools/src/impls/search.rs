//! search_files Tool
//!
//! Regex search over project files, gitignore-aware.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use ignore::WalkBuilder;
use regex::Regex;

use swarm_core::text::truncate_chars;
use swarm_llm::ParameterSchema;

use crate::path_guard::{relative_display, resolve_in_root};
use crate::trait_def::{Tool, ToolContext, ToolResult};

const MAX_RESULTS: usize = 100;
const MAX_LINE_CHARS: usize = 250;

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns 'path:line: text' matches. Honors .gitignore and skips binary files."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "pattern".to_string(),
            ParameterSchema::string(Some("Regular expression to search for")),
        );
        properties.insert(
            "path".to_string(),
            ParameterSchema::string(Some("Subdirectory to search (defaults to the project root)")),
        );
        ParameterSchema::object(None, properties, vec!["pattern".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: pattern");
        };
        let base = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");

        let regex = match Regex::new(pattern) {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("Invalid regex: {}", e)),
        };
        let search_root = match resolve_in_root(&ctx.project_root, base) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        let mut results = Vec::new();
        let walker = WalkBuilder::new(&search_root)
            .hidden(false)
            .require_git(false)
            .build();
        'files: for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            // Non-UTF-8 files are treated as binary and skipped.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let relative = relative_display(&ctx.project_root, entry.path());
            for (line_number, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    results.push(format!(
                        "{}:{}: {}",
                        relative,
                        line_number + 1,
                        truncate_chars(line.trim_end(), MAX_LINE_CHARS)
                    ));
                    if results.len() >= MAX_RESULTS {
                        break 'files;
                    }
                }
            }
        }

        if results.is_empty() {
            return ToolResult::ok(format!("No matches for '{}'", pattern));
        }
        let truncated = results.len() >= MAX_RESULTS;
        let mut output = results.join("\n");
        if truncated {
            output.push_str("\n... (result limit reached)");
        }
        ToolResult::ok(output)
    }
}
