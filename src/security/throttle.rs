//! Request throttling.
//!
//! # Responsibilities
//! - Count requests per (identity, path, time-window) fingerprint
//! - Deny with a 429 once a window's rate is exhausted
//!
//! # Design Decisions
//! - Check-and-increment is one atomic step: the map's entry guard holds the
//!   shard lock for the whole read-modify-write, so two in-flight requests
//!   cannot both pass the boundary check
//! - Windows are bucketed on the tokio clock, which tests can pause and
//!   advance deterministically
//! - In-process only; multi-process deployments delegate to an external
//!   store with native atomic increment and expiry

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::DispatchError;

/// A rate over a duration window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    pub rate: u32,
    pub window: Duration,
}

impl Throttle {
    pub fn new(rate: u32, window: Duration) -> Self {
        Self { rate, window }
    }
}

struct Counter {
    expires: Instant,
    count: u32,
}

/// Shared request counters, keyed by fingerprint.
pub struct ThrottleStore {
    counters: DashMap<String, Counter>,
    epoch: Instant,
}

impl ThrottleStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            epoch: Instant::now(),
        }
    }

    /// Admit the request and count it, or deny with the window's reset time.
    pub fn check_and_increment(
        &self,
        throttle: &Throttle,
        identity: &str,
        path: &str,
    ) -> Result<(), DispatchError> {
        let window_secs = throttle.window.as_secs().max(1);
        let elapsed = self.epoch.elapsed().as_secs();
        let bucket = elapsed / window_secs;
        let key = format!("{bucket}-{identity}-{path}");
        let window_end = self.epoch + Duration::from_secs((bucket + 1) * window_secs);

        // The entry guard pins the shard for the whole read-modify-write.
        let mut counter = self
            .counters
            .entry(key)
            .or_insert_with(|| Counter { expires: window_end, count: 0 });
        if counter.count + 1 > throttle.rate {
            let retry_after = (bucket + 1) * window_secs - elapsed;
            let reset_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
                + retry_after;
            return Err(DispatchError::Throttled { retry_after, reset_at });
        }
        counter.count += 1;
        Ok(())
    }

    /// Drop counters whose window has closed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, counter| counter.expires > now);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for ThrottleStore {
    fn default() -> Self {
        Self::new()
    }
}
