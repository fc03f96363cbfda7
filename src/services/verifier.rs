//! Project Verifier
//!
//! After every subtask is completed, the verifier runs the project's build
//! and test commands and reports a structured result. Command detection is
//! manifest-driven; each command gets a 60 second timeout and a 2 MiB
//! output cap.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::info;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

/// Structured verification outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub passed: bool,
    pub output: String,
}

impl VerificationReport {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
        }
    }
}

/// External build/lint/test runner.
#[async_trait]
pub trait ProjectVerifier: Send + Sync {
    async fn verify(&self, root: &Path) -> VerificationReport;
}

/// Manifest-driven command verifier.
pub struct CommandVerifier;

impl CommandVerifier {
    /// Detect verification commands from what is on disk.
    fn detect_commands(root: &Path) -> Vec<Vec<String>> {
        let mut commands = Vec::new();

        if root.join("Cargo.toml").exists() {
            commands.push(split("cargo check --quiet"));
        }
        if root.join("package.json").exists() {
            if root.join("tsconfig.json").exists() {
                commands.push(split("npx tsc --noEmit"));
            }
            let has_build_script = std::fs::read_to_string(root.join("package.json"))
                .map(|content| content.contains("\"build\""))
                .unwrap_or(false);
            if has_build_script {
                commands.push(split("npm run build"));
            }
        }
        if root.join("pyproject.toml").exists() || root.join("requirements.txt").exists() {
            commands.push(split("python3 -m compileall -q ."));
        }
        if root.join("go.mod").exists() {
            commands.push(split("go build ./..."));
        }

        commands
    }
}

fn split(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ProjectVerifier for CommandVerifier {
    async fn verify(&self, root: &Path) -> VerificationReport {
        let commands = Self::detect_commands(root);
        if commands.is_empty() {
            return VerificationReport::passed(
                "No recognized build system; nothing to verify.",
            );
        }

        let mut combined = String::new();
        let mut passed = true;
        for parts in commands {
            let cmd_display = parts.join(" ");
            info!(command = %cmd_display, "running verification command");
            let (ok, output) = run_command(root, &parts).await;
            combined.push_str(&format!("$ {}\n{}\n", cmd_display, output));
            if !ok {
                passed = false;
                // Keep running the rest; a full report beats a partial one.
            }
        }

        if passed {
            VerificationReport::passed(combined)
        } else {
            VerificationReport::failed(combined)
        }
    }
}

async fn run_command(root: &Path, parts: &[String]) -> (bool, String) {
    let child = Command::new(&parts[0])
        .args(&parts[1..])
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return (false, format!("failed to spawn: {}", e)),
    };

    match tokio::time::timeout(VERIFY_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(cap(&output.stdout)).into_owned();
            let stderr = String::from_utf8_lossy(cap(&output.stderr));
            if !stderr.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&stderr);
            }
            if text.is_empty() {
                text = "(no output)".to_string();
            }
            (output.status.success(), text)
        }
        Ok(Err(e)) => (false, format!("failed to run: {}", e)),
        Err(_) => (
            false,
            format!("timed out after {} s", VERIFY_TIMEOUT.as_secs()),
        ),
    }
}

fn cap(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(MAX_OUTPUT_BYTES)]
}
