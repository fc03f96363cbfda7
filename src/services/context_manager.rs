//! Orchestrator Context Manager
//!
//! The orchestrator conversation grows without bound across iterations.
//! Before each orchestrator LLM call this manager checks a character
//! budget (1 token ≈ 4 chars) and, when the threshold is crossed,
//! summarizes the middle of the conversation through the LLM, preserving
//! the system message and the most recent tail. If the summarization call
//! itself fails, the middle is silently dropped instead of failing the
//! build.

use tracing::{debug, warn};

use swarm_core::text::truncate_chars;
use swarm_llm::{ChatOptions, LlmClient, Message};

use crate::services::prompts;

/// Nominal conversation capacity in characters.
const MAX_CONTEXT_CHARS: usize = 80_000;
/// Summarization triggers above this total.
const SUMMARIZE_THRESHOLD: usize = 60_000;
/// Messages always preserved at the tail.
const PRESERVE_RECENT: usize = 8;
/// The transcript sent to the summarizer is capped at this many chars.
const TRANSCRIPT_CAP: usize = 40_000;

pub struct ContextManager {
    max_chars: usize,
    summarize_threshold: usize,
    preserve_recent: usize,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            max_chars: MAX_CONTEXT_CHARS,
            summarize_threshold: SUMMARIZE_THRESHOLD,
            preserve_recent: PRESERVE_RECENT,
        }
    }

    /// Total character weight of a conversation.
    pub fn total_chars(messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|message| match message {
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    content.as_deref().map(str::len).unwrap_or(0)
                        + tool_calls
                            .iter()
                            .map(|call| call.function.name.len() + call.function.arguments.len())
                            .sum::<usize>()
                }
                other => other.text().map(str::len).unwrap_or(0),
            })
            .sum()
    }

    /// Whether the conversation is past half of the nominal budget, used
    /// for the iteration-time pressure warning.
    pub fn over_half_budget(&self, messages: &[Message]) -> bool {
        Self::total_chars(messages) > self.max_chars / 2
    }

    /// Summarize the middle of the conversation if the threshold is
    /// exceeded. The system message at index 0 and the last
    /// `preserve_recent` messages are always kept.
    pub async fn compact_if_needed(&self, client: &LlmClient, messages: &mut Vec<Message>) {
        let total = Self::total_chars(messages);
        if total <= self.summarize_threshold {
            return;
        }
        // Need a system head, a non-empty middle, and the preserved tail.
        if messages.len() < self.preserve_recent + 2 {
            return;
        }

        let middle_start = 1;
        let middle_end = messages.len() - self.preserve_recent;
        let middle = &messages[middle_start..middle_end];
        let removed = middle.len();

        let transcript = truncate_chars(&render_transcript(middle), TRANSCRIPT_CAP);
        let request = vec![
            Message::system(prompts::summarization_system_prompt()),
            Message::user(transcript),
        ];

        let replacement = match client
            .chat_completion(&request, None, &ChatOptions::default())
            .await
        {
            Ok(response) => match response.content.filter(|content| !content.is_empty()) {
                Some(summary) => {
                    debug!(removed, total_chars = total, "conversation summarized");
                    Some(Message::user(format!("[CONTEXT SUMMARY]\n{}", summary)))
                }
                None => {
                    warn!("summarizer returned empty reply; truncating middle");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "summarization failed; truncating middle");
                None
            }
        };

        let mut compacted = Vec::with_capacity(messages.len() - removed + 1);
        compacted.push(messages[0].clone());
        if let Some(summary_message) = replacement {
            compacted.push(summary_message);
        }
        compacted.extend_from_slice(&messages[middle_end..]);
        *messages = compacted;
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Render messages as a "[role]: content" transcript for the summarizer.
fn render_transcript(messages: &[Message]) -> String {
    let mut transcript = String::new();
    for message in messages {
        let text = match message {
            Message::Assistant {
                content,
                tool_calls,
            } if content.is_none() && !tool_calls.is_empty() => {
                let names: Vec<&str> = tool_calls
                    .iter()
                    .map(|call| call.function.name.as_str())
                    .collect();
                format!("(called tools: {})", names.join(", "))
            }
            other => other.text().unwrap_or("").to_string(),
        };
        transcript.push_str(&format!("[{}]: {}\n", message.role(), text));
    }
    transcript
}
