//! OpenAI SSE Stream Adapter
//!
//! Accumulates Server-Sent-Events chunks from a streaming chat completion
//! into a [`ChatResponse`] with the same shape as a non-streaming reply.
//!
//! Tool calls are accumulated per `index`: the id usually arrives only in
//! the first chunk for that index, while the name and argument string are
//! concatenated across chunks. The finish reason is the last non-null one
//! seen; usage arrives in the terminal chunk when the request sets
//! `stream_options.include_usage`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{ChatResponse, LlmError, LlmResult, ToolCall, Usage};

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulator for one streamed chat completion.
#[derive(Debug, Default)]
pub struct OpenAiStreamAdapter {
    content: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    done: bool,
}

impl OpenAiStreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one SSE line. Returns the text delta carried by the line, if
    /// any, so the caller can forward it as a token chunk.
    pub fn adapt(&mut self, line: &str) -> LlmResult<Option<String>> {
        let trimmed = line.trim();
        let payload = match trimmed.strip_prefix("data:") {
            Some(rest) => rest.trim(),
            None => return Ok(None), // comments, event names, blank keep-alives
        };

        if payload.is_empty() {
            return Ok(None);
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(payload)
            .map_err(|e| LlmError::parse(format!("bad stream chunk: {}", e)))?;

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let mut text_delta: Option<String> = None;
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else { continue };

            if let Some(content) = delta.content {
                if !content.is_empty() {
                    self.content.push_str(&content);
                    text_delta = Some(match text_delta {
                        Some(mut acc) => {
                            acc.push_str(&content);
                            acc
                        }
                        None => content,
                    });
                }
            }

            for tc in delta.tool_calls.unwrap_or_default() {
                let index = tc.index.unwrap_or(0);
                let entry = self.tool_calls.entry(index).or_default();
                if let Some(id) = tc.id {
                    if !id.is_empty() && entry.id.is_empty() {
                        entry.id = id;
                    }
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
        }

        Ok(text_delta)
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume the accumulated stream into a response. Tool calls come out
    /// ordered by index; entries that never received a name are dropped.
    pub fn finish(self, model: impl Into<String>) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .filter(|partial| !partial.name.is_empty())
            .map(|partial| ToolCall::new(partial.id, partial.name, partial.arguments))
            .collect();

        ChatResponse {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
            model: model.into(),
        }
    }
}
