//! LLM Call Rate Limiter
//!
//! Bounds two things at once: the number of in-flight acquisitions
//! (concurrency) and the number of successful acquisitions in any rolling
//! one-hour window. Waiting is cooperative: a blocked caller is woken when
//! a slot frees or the oldest window timestamp ages out, and always
//! re-checks both bounds because another waiter may have been admitted in
//! the meantime.
//!
//! Two limiter populations coexist in a build: one shared instance for
//! orchestrator calls and one per worker, so workers do not contend with
//! each other on the shared concurrency slots.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::events::{EventBus, SwarmEvent};

/// Rolling window for the hourly bound.
const HOUR: Duration = Duration::from_millis(3_600_000);

#[derive(Debug)]
struct LimiterState {
    active: usize,
    admitted: VecDeque<Instant>,
    max_concurrent: usize,
    max_per_hour: usize,
}

impl LimiterState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Concurrency + hourly-window rate limiter.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    notify: Notify,
    window: Duration,
    bus: Arc<EventBus>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, max_per_hour: usize, bus: Arc<EventBus>) -> Self {
        Self::with_window(max_concurrent, max_per_hour, HOUR, bus)
    }

    /// Construct with a custom window duration. Tests use short windows to
    /// exercise the hourly-bound path without sleeping for an hour.
    pub fn with_window(
        max_concurrent: usize,
        max_per_hour: usize,
        window: Duration,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                active: 0,
                admitted: VecDeque::new(),
                max_concurrent,
                max_per_hour,
            }),
            notify: Notify::new(),
            window,
            bus,
        }
    }

    /// Wait until both bounds admit the caller, then record the admission.
    pub async fn acquire(&self) {
        loop {
            let window_wait = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let now = Instant::now();
                state.prune(now, self.window);

                if state.active < state.max_concurrent
                    && state.admitted.len() < state.max_per_hour
                {
                    state.active += 1;
                    state.admitted.push_back(now);
                    return;
                }

                if state.admitted.len() >= state.max_per_hour {
                    state
                        .admitted
                        .front()
                        .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                } else {
                    None
                }
            };

            match window_wait {
                Some(wait) if !wait.is_zero() => {
                    self.bus.emit(SwarmEvent::RateLimitWait {
                        wait_ms: wait.as_millis() as u64,
                    });
                    // Wake early if a release or limit change happens first.
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                _ => {
                    // Concurrency-bound (or a timestamp just aged out):
                    // wait for a release.
                    self.notify.notified().await;
                }
            }
        }
    }

    /// Release an admission and wake one waiter.
    pub fn release(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.active = state.active.saturating_sub(1);
        }
        self.notify.notify_one();
    }

    /// Change the bounds. Already-admitted callers are unaffected; all
    /// waiters are woken to re-check against the new limits.
    pub fn update_limits(&self, max_concurrent: usize, max_per_hour: usize) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.max_concurrent = max_concurrent;
            state.max_per_hour = max_per_hour;
        }
        self.notify.notify_waiters();
    }

    /// Number of currently in-flight acquisitions.
    pub fn in_flight(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active
    }

    /// Number of admissions still inside the rolling window.
    pub fn window_count(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.prune(Instant::now(), self.window);
        state.admitted.len()
    }
}
