//! Fixed-window per-subject rate limiter.
//!
//! Window identity is `floor(now / 60)`; exactly `limit` requests succeed
//! per subject per window, and the reject path never increments. The
//! counter map is process-local and injected into handlers, so tests can
//! construct one per case and a sharded deployment can swap in an external
//! counter store behind the same surface.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use domains::{AppError, Result};

const WINDOW_SECS: u64 = 60;
/// Opportunistic cleanup trigger: sweep once the map outgrows this.
const SWEEP_THRESHOLD: usize = 5000;
/// Entries whose window started longer ago than this are dropped.
const STALE_AFTER_SECS: u64 = 3600;

struct WindowCounter {
    started: u64,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    state: DashMap<String, WindowCounter>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: DashMap::new(),
        }
    }

    /// Checks and increments the caller's counter for the current window.
    pub fn check(&self, subject: &str) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(subject, now)
    }

    /// Clock-injected variant; `check` delegates here.
    pub fn check_at(&self, subject: &str, now: u64) -> Result<()> {
        let window = now / WINDOW_SECS;
        let key = format!("{subject}:{window}");
        {
            // The entry guard makes check-then-increment atomic per key.
            let mut entry = self.state.entry(key).or_insert(WindowCounter {
                started: now,
                count: 0,
            });
            if entry.count + 1 > self.limit {
                return Err(AppError::RateLimited(format!(
                    "limit is {} requests per minute",
                    self.limit
                )));
            }
            entry.count += 1;
        }

        if self.state.len() > SWEEP_THRESHOLD {
            self.state
                .retain(|_, counter| now.saturating_sub(counter.started) <= STALE_AFTER_SECS);
        }
        Ok(())
    }
}
