//! execute_command Tool
//!
//! Runs an allow-listed command as a direct child process (no shell) with
//! a 30 second timeout and a 1 MiB output cap.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use swarm_llm::ParameterSchema;

use crate::command_policy::validate_command;
use crate::path_guard::resolve_in_root;
use crate::trait_def::{Tool, ToolContext, ToolResult};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run a command in the project (npm, cargo, python, git, ...). No shell features: pipes, redirection and command chaining are rejected. 30 second timeout."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "command".to_string(),
            ParameterSchema::string(Some("The command line to run, e.g. 'npm install'")),
        );
        properties.insert(
            "working_dir".to_string(),
            ParameterSchema::string(Some(
                "Working directory relative to the project root (defaults to the root)",
            )),
        );
        ParameterSchema::object(None, properties, vec!["command".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(command) = args.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: command");
        };
        let working_dir = args.get("working_dir").and_then(|v| v.as_str()).unwrap_or(".");

        let parts = match validate_command(command) {
            Ok(parts) => parts,
            Err(e) => return ToolResult::err(e),
        };
        let cwd = match resolve_in_root(&ctx.project_root, working_dir) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };

        let child = Command::new(&parts[0])
            .args(&parts[1..])
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("Failed to spawn '{}': {}", parts[0], e)),
        };

        let output = match tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::err(format!("Failed to run command: {}", e)),
            // Dropping the future kills the child (kill_on_drop).
            Err(_) => {
                return ToolResult::err(format!(
                    "Command timed out after {} s",
                    COMMAND_TIMEOUT.as_secs()
                ))
            }
        };

        let stdout = cap_output(&output.stdout);
        let stderr = cap_output(&output.stderr);

        let mut text = String::new();
        if !stdout.is_empty() {
            text.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n--- stderr ---\n");
            }
            text.push_str(&stderr);
        }

        if output.status.success() {
            ToolResult::ok(if text.is_empty() {
                "Command completed successfully with no output".to_string()
            } else {
                text
            })
        } else {
            let code = output.status.code().unwrap_or(-1);
            ToolResult::err(format!("Command failed with exit code {}\n{}", code, text))
        }
    }
}

fn cap_output(bytes: &[u8]) -> String {
    let capped = if bytes.len() > MAX_OUTPUT_BYTES {
        &bytes[..MAX_OUTPUT_BYTES]
    } else {
        bytes
    };
    let mut text = String::from_utf8_lossy(capped).into_owned();
    if bytes.len() > MAX_OUTPUT_BYTES {
        text.push_str("\n... (output truncated at 1 MiB)");
    }
    text
}
