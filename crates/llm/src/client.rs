//! Retrying Chat-Completions Client
//!
//! Wraps an OpenAI-compatible endpoint with rate limiting, token
//! accounting, retry with exponential backoff, and streaming synthesis.
//!
//! Model id, base URL, and API key are re-read from the shared
//! configuration before every attempt, so rotated credentials take effect
//! mid-build without rebuilding the client.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use swarm_core::{EventBus, RateLimiter, SharedConfig, SwarmConfig, SwarmEvent, TokenAccountant};

use crate::http_client::build_http_client;
use crate::sse::OpenAiStreamAdapter;
use crate::types::{
    ChatResponse, LlmError, LlmResult, Message, ToolCall, ToolDefinition, Usage,
};

/// Extra attempts after the first failure (4 total).
const MAX_RETRIES: u32 = 3;
/// Base backoff before jitter, doubled per attempt.
const BACKOFF_BASE_MS: u64 = 1000;
/// Uniform jitter added to every backoff sleep.
const JITTER_MS: u64 = 500;

/// Per-call options.
#[derive(Default, Clone)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Limiter to acquire for this call. Workers pass their own instance;
    /// `None` falls back to the shared limiter.
    pub limiter: Option<Arc<RateLimiter>>,
}

/// Retrying, streaming, tool-aware chat client.
pub struct LlmClient {
    http: reqwest::Client,
    config: SharedConfig,
    shared_limiter: Arc<RateLimiter>,
    accountant: Arc<TokenAccountant>,
    bus: Arc<EventBus>,
}

impl LlmClient {
    pub fn new(
        config: SharedConfig,
        shared_limiter: Arc<RateLimiter>,
        accountant: Arc<TokenAccountant>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            http: build_http_client(),
            config,
            shared_limiter,
            accountant,
            bus,
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat_completion(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &ChatOptions,
    ) -> LlmResult<ChatResponse> {
        let limiter = options
            .limiter
            .clone()
            .unwrap_or_else(|| self.shared_limiter.clone());

        let mut attempt = 0;
        loop {
            limiter.acquire().await;
            let result = self.attempt_completion(messages, tools, options).await;
            limiter.release();

            match result {
                Ok(response) => {
                    self.record_usage(response.usage);
                    return Ok(response);
                }
                Err(err) => self.handle_failure(err, &mut attempt).await?,
            }
        }
    }

    /// Streaming chat completion. Text deltas are forwarded through `tx` as
    /// they arrive; the returned response has the same shape as the
    /// non-streaming variant, synthesized from the stream.
    pub async fn chat_completion_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        tx: mpsc::Sender<String>,
        options: &ChatOptions,
    ) -> LlmResult<ChatResponse> {
        let limiter = options
            .limiter
            .clone()
            .unwrap_or_else(|| self.shared_limiter.clone());

        let mut attempt = 0;
        loop {
            limiter.acquire().await;
            let result = self.attempt_stream(messages, tools, &tx, options).await;
            limiter.release();

            match result {
                Ok(response) => {
                    self.record_usage(response.usage);
                    return Ok(response);
                }
                Err(err) => self.handle_failure(err, &mut attempt).await?,
            }
        }
    }

    /// Retry bookkeeping shared by both operations: sleep and return `Ok`
    /// to go around again, or propagate the terminal error.
    async fn handle_failure(&self, err: LlmError, attempt: &mut u32) -> LlmResult<()> {
        if !err.is_retryable() || *attempt >= MAX_RETRIES {
            return Err(err);
        }
        let delay = backoff_delay(*attempt);
        *attempt += 1;
        warn!(attempt = *attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying LLM call");
        self.bus.emit(SwarmEvent::LlmRetry {
            attempt: *attempt,
            delay_ms: delay.as_millis() as u64,
            reason: err.to_string(),
        });
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn record_usage(&self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            self.accountant
                .record(usage.prompt_tokens, usage.completion_tokens);
        }
    }

    async fn attempt_completion(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &ChatOptions,
    ) -> LlmResult<ChatResponse> {
        let config = self.config.snapshot();
        let body = build_request_body(&config, messages, tools, false, options);
        debug!(model = %config.model, messages = messages.len(), "chat completion request");

        let response = self
            .request(&config, &body)
            .await?
            .text()
            .await
            .map_err(LlmError::from_transport)?;

        let wire: WireResponse = serde_json::from_str(&response)
            .map_err(|e| LlmError::parse(format!("bad completion response: {}", e)))?;
        Ok(wire.into_chat_response(&config.model))
    }

    async fn attempt_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        tx: &mpsc::Sender<String>,
        options: &ChatOptions,
    ) -> LlmResult<ChatResponse> {
        let config = self.config.snapshot();
        let body = build_request_body(&config, messages, tools, true, options);
        debug!(model = %config.model, messages = messages.len(), "streaming chat completion request");

        let response = self.request(&config, &body).await?;

        let mut adapter = OpenAiStreamAdapter::new();
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(LlmError::from_transport)?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line: String = buffer.drain(..=line_end).collect();
                if let Some(delta) = adapter.adapt(&line)? {
                    // A closed receiver just means nobody is listening for
                    // tokens anymore; the call itself continues.
                    let _ = tx.send(delta).await;
                }
            }
        }
        if !buffer.trim().is_empty() {
            if let Some(delta) = adapter.adapt(&buffer)? {
                let _ = tx.send(delta).await;
            }
        }

        Ok(adapter.finish(&config.model))
    }

    async fn request(
        &self,
        config: &SwarmConfig,
        body: &serde_json::Value,
    ) -> LlmResult<reqwest::Response> {
        let mut request = self
            .http
            .post(config.chat_completions_url())
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(LlmError::from_transport)?;
        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body_text));
        }
        Ok(response)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
    Duration::from_millis(BACKOFF_BASE_MS * (1 << attempt) + jitter)
}

/// Build the request body shared by both operations.
fn build_request_body(
    config: &SwarmConfig,
    messages: &[Message],
    tools: Option<&[ToolDefinition]>,
    stream: bool,
    options: &ChatOptions,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "temperature": options.temperature.unwrap_or(config.temperature),
        "max_tokens": options.max_tokens.unwrap_or(config.max_tokens),
    });

    if let Some(tools) = tools {
        if !tools.is_empty() {
            let wire_tools: Vec<serde_json::Value> = tools.iter().map(tool_to_wire).collect();
            body["tools"] = serde_json::json!(wire_tools);
            body["tool_choice"] = serde_json::json!("auto");
        }
    }

    if stream {
        body["stream"] = serde_json::json!(true);
        body["stream_options"] = serde_json::json!({ "include_usage": true });
    }

    body
}

fn tool_to_wire(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ── Wire response DTOs ───────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, serde::Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl WireResponse {
    fn into_chat_response(mut self, fallback_model: &str) -> ChatResponse {
        let choice = if self.choices.is_empty() {
            None
        } else {
            Some(self.choices.remove(0))
        };

        let (content, tool_calls, finish_reason) = match choice {
            Some(choice) => {
                let finish_reason = choice.finish_reason;
                match choice.message {
                    Some(message) => (
                        message.content,
                        message.tool_calls.unwrap_or_default(),
                        finish_reason,
                    ),
                    None => (None, Vec::new(), finish_reason),
                }
            }
            None => (None, Vec::new(), None),
        };

        ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: self.usage,
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SwarmConfig {
        SwarmConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request_body_defaults() {
        let body = build_request_body(
            &config(),
            &[Message::user("hi")],
            None,
            false,
            &ChatOptions::default(),
        );
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("tools").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_build_request_body_with_tools_and_stream() {
        let tools = vec![ToolDefinition {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            parameters: crate::types::ParameterSchema::object(
                None,
                std::collections::HashMap::new(),
                vec![],
            ),
        }];
        let body = build_request_body(
            &config(),
            &[Message::user("hi")],
            Some(&tools),
            true,
            &ChatOptions::default(),
        );
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_options_override_config() {
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(512),
            limiter: None,
        };
        let body = build_request_body(&config(), &[Message::user("hi")], None, false, &options);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_backoff_schedule() {
        for attempt in 0..4 {
            let base = BACKOFF_BASE_MS * (1 << attempt);
            let delay = backoff_delay(attempt).as_millis() as u64;
            assert!(delay >= base && delay < base + JITTER_MS);
        }
    }

    #[test]
    fn test_wire_response_conversion() {
        let raw = r#"{
            "model": "gpt-4o-2024",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"path\":\"a\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12}
        }"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        let response = wire.into_chat_response("fallback");
        assert_eq!(response.model, "gpt-4o-2024");
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].function.name, "read_file");
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(response.usage.unwrap().completion_tokens, 12);
    }

    #[test]
    fn test_wire_response_empty_choices() {
        let wire: WireResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let response = wire.into_chat_response("m");
        assert_eq!(response.content, None);
        assert_eq!(response.model, "m");
    }
}
