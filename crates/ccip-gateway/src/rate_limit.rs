//! Sliding-log rate limiting.
//!
//! Each key holds a deque of request timestamps in monotonic milliseconds;
//! entries older than the window are evicted on every check, so the limit
//! holds over any window-length interval, not just aligned ones. A denied
//! request is never appended. State is process-local.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{SecondsFormat, Utc};

/// Per-IP tier: 100 requests per 60 seconds.
pub const IP_LIMIT: (Duration, usize) = (Duration::from_secs(60), 100);
/// Per-API-key tier: 1000 requests per 60 seconds.
pub const API_KEY_LIMIT: (Duration, usize) = (Duration::from_secs(60), 1000);

/// How often the background sweep evicts stale buckets.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Admission result, with everything the response headers need.
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    pub retry_after_secs: u64,
    /// RFC 3339 instant at which the current window has fully slid past.
    pub reset: String,
}

pub struct SlidingWindowLimiter {
    window: Duration,
    max: usize,
    epoch: Instant,
    buckets: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max: usize) -> Self {
        Self {
            window,
            max,
            epoch: Instant::now(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check-and-record for one key. The lock is held only for the duration
    /// of this call, never across dispatch.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, self.now_ms())
    }

    fn check_at(&self, key: &str, now_ms: u64) -> Decision {
        let window_ms = self.window.as_millis() as u64;
        let window_start = now_ms.saturating_sub(window_ms);

        let mut buckets = self.buckets.lock().unwrap();
        let log = buckets.entry(key.to_string()).or_default();
        while log.front().is_some_and(|&t| t < window_start) {
            log.pop_front();
        }

        let reset = (Utc::now() + chrono::Duration::milliseconds(window_ms as i64))
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        if log.len() >= self.max {
            return Decision {
                allowed: false,
                limit: self.max,
                remaining: 0,
                retry_after_secs: self.window.as_secs(),
                reset,
            };
        }

        log.push_back(now_ms);
        Decision {
            allowed: true,
            limit: self.max,
            remaining: self.max - log.len(),
            retry_after_secs: 0,
            reset,
        }
    }

    /// Evict expired entries and drop keys whose logs emptied out.
    pub fn sweep(&self) {
        let window_start = self.now_ms().saturating_sub(self.window.as_millis() as u64);
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, log| {
            while log.front().is_some_and(|&t| t < window_start) {
                log.pop_front();
            }
            !log.is_empty()
        });
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

/// The gateway's two admission tiers.
pub struct RateLimiters {
    pub ip: SlidingWindowLimiter,
    pub api_key: SlidingWindowLimiter,
}

impl RateLimiters {
    pub fn standard() -> Self {
        Self {
            ip: SlidingWindowLimiter::new(IP_LIMIT.0, IP_LIMIT.1),
            api_key: SlidingWindowLimiter::new(API_KEY_LIMIT.0, API_KEY_LIMIT.1),
        }
    }

    /// Pick the tier: the API-key limiter iff a key is present, otherwise
    /// the per-IP limiter keyed by client address.
    pub fn admit(&self, api_key: Option<&str>, client_ip: &str) -> Decision {
        match api_key {
            Some(key) => self.api_key.check(key),
            None => self.ip.check(client_ip),
        }
    }

    pub fn sweep(&self) {
        self.ip.sweep();
        self.api_key.sweep();
    }
}

/// Periodic eviction of stale limiter state.
pub fn spawn_sweeper(limiters: Arc<RateLimiters>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it.
        tick.tick().await;
        loop {
            tick.tick().await;
            limiters.sweep();
        }
    });
}
