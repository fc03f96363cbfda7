//! Per-Path File Locks
//!
//! In-process mutual exclusion over case-insensitively normalized paths,
//! used by the write and patch tools so two workers never interleave writes
//! to the same file. Reads do not lock. Cross-process safety is not
//! provided and not required.
//!
//! A worker re-acquiring a path it already holds returns immediately, so a
//! worker cannot deadlock on itself. One `release` drops the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy)]
struct Holder {
    worker: usize,
    acquired_at: Instant,
}

struct LockEntry {
    holder: Option<Holder>,
    notify: Arc<Notify>,
}

/// Keyed mutual exclusion for file writes.
pub struct FileLocks {
    entries: Mutex<HashMap<String, LockEntry>>,
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

impl FileLocks {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Block until the lock for `path` is free (or already held by this
    /// worker), then take it.
    pub async fn acquire(&self, path: &str, worker: usize) {
        let key = normalize(path);
        loop {
            let notify = {
                let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
                let entry = entries.entry(key.clone()).or_insert_with(|| LockEntry {
                    holder: None,
                    notify: Arc::new(Notify::new()),
                });
                match entry.holder {
                    None => {
                        entry.holder = Some(Holder {
                            worker,
                            acquired_at: Instant::now(),
                        });
                        return;
                    }
                    Some(holder) if holder.worker == worker => return,
                    Some(_) => entry.notify.clone(),
                }
            };
            notify.notified().await;
        }
    }

    /// Drop the lock for `path` and wake the first waiter.
    pub fn release(&self, path: &str) {
        let key = normalize(path);
        let notify = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get_mut(&key) {
                Some(entry) => {
                    // The entry stays in the map so queued waiters keep
                    // their Notify; clearing the holder frees the lock.
                    entry.holder = None;
                    entry.notify.clone()
                }
                None => return,
            }
        };
        notify.notify_one();
    }

    /// Current holder of `path`, with how long it has been held.
    pub fn holder(&self, path: &str) -> Option<(usize, Duration)> {
        let key = normalize(path);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key)
            .and_then(|entry| entry.holder)
            .map(|holder| (holder.worker, holder.acquired_at.elapsed()))
    }
}

impl Default for FileLocks {
    fn default() -> Self {
        Self::new()
    }
}
