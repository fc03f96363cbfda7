//! LLM Wire Types
//!
//! Message, tool, and response types for the OpenAI-compatible
//! chat-completions protocol. Messages serialize directly to the wire
//! shape, so the request builder never hand-assembles role objects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A message in the conversation, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of a tool execution, fed back to the model.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Text content of the message, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::Tool { content, .. } => Some(content),
        }
    }

    /// Role name as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// A tool call requested by the model, in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// The function half of a tool call. `arguments` is the raw JSON string
/// exactly as the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the argument string, falling back to `null` on malformed JSON
    /// so a bad call still reaches the tool layer (which reports the
    /// missing parameters back to the model).
    pub fn parsed_arguments(&self) -> serde_json::Value {
        serde_json::from_str(&self.function.arguments).unwrap_or(serde_json::Value::Null)
    }
}

/// JSON Schema for tool parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
}

impl ParameterSchema {
    pub fn string(description: Option<&str>) -> Self {
        Self {
            schema_type: "string".to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
        }
    }

    pub fn integer(description: Option<&str>) -> Self {
        Self {
            schema_type: "integer".to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
        }
    }

    pub fn boolean(description: Option<&str>) -> Self {
        Self {
            schema_type: "boolean".to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
        }
    }

    pub fn object(
        description: Option<&str>,
        properties: HashMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            schema_type: "object".to_string(),
            description: description.map(|s| s.to_string()),
            properties: Some(properties),
            required: Some(required),
            items: None,
        }
    }

    pub fn array(description: Option<&str>, items: ParameterSchema) -> Self {
        Self {
            schema_type: "array".to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: Some(Box::new(items)),
        }
    }
}

/// Definition of a tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Token usage reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A complete chat response, whether received whole or synthesized from a
/// stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub model: String,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Transport errors. `is_retryable` is the single source of truth for the
/// retry policy: HTTP 429, any 5xx, and connection-family failures retry;
/// everything else propagates immediately.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("rate limited (429): {message}")]
    RateLimited { message: String },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Connection reset, timeout, DNS failure, refused connection.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Any other HTTP failure status (401, 404, 400, ...).
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("{message}")]
    Other { message: String },
}

pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Server { .. } | LlmError::Connection { .. }
        )
    }

    /// Classify an HTTP failure status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = swarm_core::text::truncate_chars(body, 500);
        match status {
            429 => LlmError::RateLimited { message },
            500..=599 => LlmError::Server { status, message },
            _ => LlmError::Http { status, message },
        }
    }

    /// Classify a reqwest transport error. Only connect and timeout
    /// failures are retryable; body/decode errors are not.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            LlmError::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            LlmError::Parse {
                message: err.to_string(),
            }
        } else {
            LlmError::Other {
                message: err.to_string(),
            }
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        LlmError::Parse {
            message: message.into(),
        }
    }
}

impl From<LlmError> for swarm_core::SwarmError {
    fn from(err: LlmError) -> Self {
        swarm_core::SwarmError::Llm(err.to_string())
    }
}
