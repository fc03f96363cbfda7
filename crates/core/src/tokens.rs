//! Token Accounting
//!
//! Aggregates prompt/completion token usage across every LLM call in a
//! build. The transport records usage after each successful response; each
//! update is announced on the `tokens:update` topic.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::events::{EventBus, SwarmEvent};

/// Aggregate usage across all LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_calls: u64,
}

impl TokenTotals {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Shared token accountant.
pub struct TokenAccountant {
    totals: Mutex<TokenTotals>,
    bus: Arc<EventBus>,
}

impl TokenAccountant {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            totals: Mutex::new(TokenTotals::default()),
            bus,
        }
    }

    /// Add one call's reported usage to the running totals.
    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64) {
        let totals = {
            let mut guard = self.totals.lock().unwrap_or_else(|e| e.into_inner());
            guard.prompt_tokens += prompt_tokens;
            guard.completion_tokens += completion_tokens;
            guard.total_calls += 1;
            *guard
        };
        self.bus.emit(SwarmEvent::TokensUpdate {
            prompt_tokens: totals.prompt_tokens,
            completion_tokens: totals.completion_tokens,
            total_calls: totals.total_calls,
        });
    }

    /// Zero the totals at the start of a new build.
    pub fn reset(&self) {
        let mut guard = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        *guard = TokenTotals::default();
    }

    pub fn totals(&self) -> TokenTotals {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }
}
