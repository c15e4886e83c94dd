//! Inbound flood protection for WebSocket connections
//!
//! Each connection gets a fixed-window message budget, and oversized frames are
//! refused before they reach the JSON parser.

use crate::config::{env_flag, env_parse};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Rate limiter state
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of connection id to (message count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    /// Maximum messages per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(10)) // 30 messages per 10 seconds
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Check if a message should be allowed
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        match requests.get_mut(key) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) >= self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                requests.insert(key.to_string(), (1, now));
                true
            }
        }
    }

    /// Drop the budget of a closed connection
    pub async fn forget(&self, key: &str) {
        self.requests.write().await.remove(key);
    }

    /// Clean up old entries (call periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }

    pub async fn tracked(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Anti-abuse configuration
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Rate limiter (None = disabled)
    pub rate_limiter: Option<RateLimiter>,
    /// Largest accepted text frame, in bytes
    pub max_message_bytes: usize,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            rate_limiter: Some(RateLimiter::default()),
            max_message_bytes: 4096,
        }
    }
}

impl AbuseConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate_limit_enabled = env_flag("WS_RATE_LIMIT", true);

        let rate_limiter = if rate_limit_enabled {
            let max_requests: u32 = env_parse("WS_RATE_LIMIT_MAX").unwrap_or(30);
            let window_secs: u64 = env_parse("WS_RATE_LIMIT_WINDOW").unwrap_or(10);
            Some(RateLimiter::new(
                max_requests,
                Duration::from_secs(window_secs),
            ))
        } else {
            None
        };

        let max_message_bytes = env_parse::<usize>("WS_MAX_MESSAGE_BYTES")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_message_bytes);

        tracing::info!(
            rate_limit_enabled,
            max_message_bytes,
            "Anti-abuse config loaded"
        );

        Self {
            rate_limiter,
            max_message_bytes,
        }
    }

    /// Reason to refuse an inbound frame, if any
    pub async fn screen(&self, key: &str, frame_len: usize) -> Option<(&'static str, String)> {
        if frame_len > self.max_message_bytes {
            return Some((
                "MESSAGE_TOO_LARGE",
                format!("Message exceeds {} bytes", self.max_message_bytes),
            ));
        }
        if let Some(ref limiter) = self.rate_limiter {
            if !limiter.check(key).await {
                return Some((
                    "RATE_LIMITED",
                    "Rate limit exceeded. Please slow down.".to_string(),
                ));
            }
        }
        None
    }
}
