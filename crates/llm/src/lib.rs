//! LLM transport for the swarm engine.
//!
//! A retrying, optionally-streaming, tool-aware client over an
//! OpenAI-compatible chat-completions endpoint. The wire types live in
//! [`types`], the SSE accumulation logic in [`sse`], and the retry loop in
//! [`client`].

pub mod client;
pub mod http_client;
pub mod sse;
pub mod types;

pub use client::{ChatOptions, LlmClient};
pub use sse::OpenAiStreamAdapter;
pub use types::{
    ChatResponse, FunctionCall, LlmError, LlmResult, Message, ParameterSchema, ToolCall,
    ToolDefinition, Usage,
};
