//! Tool Trait and Registry
//!
//! The unified `Tool` interface and the registry the worker loop dispatches
//! through. Tools receive everything they need through [`ToolContext`]: the
//! project root, the calling worker's index, the shared file locks, the
//! worker's artifact sink, and the event bus.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use swarm_core::{EventBus, FileLocks, SwarmEvent};
use swarm_llm::{ParameterSchema, ToolDefinition};

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Create an error result
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// The string fed back to the model as the tool-role message.
    pub fn into_message(self) -> String {
        if self.success {
            self.output.unwrap_or_default()
        } else {
            format!("Error: {}", self.error.unwrap_or_default())
        }
    }
}

/// Context provided to each tool during execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Project root directory; tools must never touch paths outside it
    pub project_root: PathBuf,
    /// Index of the worker running this tool
    pub worker_index: usize,
    /// Per-path write locks shared across all workers
    pub file_locks: Arc<FileLocks>,
    /// The owning subtask's artifact list (relative paths, append-only)
    pub artifacts: Arc<Mutex<Vec<String>>>,
    /// Progress event bus
    pub bus: Arc<EventBus>,
    /// HTTP client for the web-ecosystem tools
    pub http: reqwest::Client,
}

impl ToolContext {
    pub fn new(
        project_root: PathBuf,
        worker_index: usize,
        file_locks: Arc<FileLocks>,
        artifacts: Arc<Mutex<Vec<String>>>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            project_root,
            worker_index,
            file_locks,
            artifacts,
            bus,
            http: reqwest::Client::new(),
        }
    }

    /// Record a produced file: append to the artifact list and announce it.
    pub fn record_artifact(&self, relative_path: &str) {
        {
            let mut artifacts = self
                .artifacts
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            artifacts.push(relative_path.to_string());
        }
        self.bus.emit(SwarmEvent::FileWritten {
            path: relative_path.to_string(),
            worker: self.worker_index,
        });
    }
}

/// Unified tool interface.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of this tool (e.g. "read_file", "execute_command")
    fn name(&self) -> &str;

    /// Human-readable description sent to the model
    fn description(&self) -> &str;

    /// JSON schema describing the tool's input parameters
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with the given context and arguments.
    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult;
}

/// Registry of available tools with insertion-ordered definitions.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tool definitions in registration order, ready to send to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name. Unknown names produce an error result so the
    /// model can recover.
    pub async fn execute(&self, name: &str, ctx: &ToolContext, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute(ctx, args).await,
            None => ToolResult::err(format!("Unknown tool: {}", name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the message argument"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            let mut properties = HashMap::new();
            properties.insert(
                "message".to_string(),
                ParameterSchema::string(Some("Message to echo")),
            );
            ParameterSchema::object(None, properties, vec!["message".to_string()])
        }

        async fn execute(&self, _ctx: &ToolContext, args: Value) -> ToolResult {
            match args.get("message").and_then(|v| v.as_str()) {
                Some(message) => ToolResult::ok(message),
                None => ToolResult::err("Missing required parameter: message"),
            }
        }
    }

    #[test]
    fn test_tool_result_into_message() {
        assert_eq!(ToolResult::ok("fine").into_message(), "fine");
        assert_eq!(ToolResult::err("broke").into_message(), "Error: broke");
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);

        let dir = tempfile::TempDir::new().unwrap();
        let ctx = test_support::make_ctx(dir.path());

        let result = registry
            .execute("echo", &ctx, serde_json::json!({"message": "hi"}))
            .await;
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hi"));

        let result = registry.execute("missing", &ctx, serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown tool"));
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn test_record_artifact_emits_file_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        bus.subscribe(move |event| {
            if let SwarmEvent::FileWritten { path, worker } = event {
                seen_clone.lock().unwrap().push((path.clone(), *worker));
            }
        });

        let ctx = ToolContext::new(
            dir.path().to_path_buf(),
            2,
            Arc::new(FileLocks::new()),
            Arc::new(Mutex::new(Vec::new())),
            bus,
        );
        ctx.record_artifact("src/app.ts");

        assert_eq!(ctx.artifacts.lock().unwrap().as_slice(), ["src/app.ts"]);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            [("src/app.ts".to_string(), 2)]
        );
    }
}
