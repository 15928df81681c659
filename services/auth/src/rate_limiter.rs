//! Login attempt limiter
//!
//! Counts failed logins per key (the lowercased username). After
//! `max_attempts` failures inside `window_seconds` the key is banned for
//! `ban_duration_seconds`. A successful login clears the counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 3600, // 1 hour
        }
    }
}

#[derive(Debug)]
struct Entry {
    failures: u32,
    window_start: Instant,
    banned_until: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    /// Whether `key` may attempt a login right now.
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(entry) = entries.get_mut(key) else {
            return true;
        };

        match entry.banned_until {
            Some(until) if now < until => false,
            Some(_) => {
                entries.remove(key);
                true
            }
            None => true,
        }
    }

    /// Count a failed attempt. Returns true when this failure triggered a ban.
    pub async fn record_failure(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = self.window();

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            failures: 0,
            window_start: now,
            banned_until: None,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.failures = 0;
            entry.window_start = now;
        }

        entry.failures += 1;
        debug!("Failed login {} for key {}", entry.failures, key);

        if entry.failures >= self.config.max_attempts && entry.banned_until.is_none() {
            entry.banned_until = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Banned key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return true;
        }

        false
    }

    /// Forget a key after a successful login.
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Drop entries whose ban and window have both lapsed.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = self.window();
        let before = entries.len();

        entries.retain(|_, entry| match entry.banned_until {
            Some(until) => now < until,
            None => now.duration_since(entry.window_start) < window,
        });

        before - entries.len()
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
