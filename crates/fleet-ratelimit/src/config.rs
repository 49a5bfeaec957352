//! Default rate limit tables, keyed by provider id and by user tier.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct WindowLimit {
    pub requests_per_window: u64,
    pub tokens_per_window: u64,
    pub window: Duration,
}

impl WindowLimit {
    pub const fn new(requests_per_window: u64, tokens_per_window: u64, window_secs: u64) -> Self {
        Self { requests_per_window, tokens_per_window, window: Duration::from_secs(window_secs) }
    }
}

/// Session scope has no token budget: just a conservative fixed request
/// limit independent of tier.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimit {
    pub requests_per_window: u64,
    pub window: Duration,
}

const PROVIDER_WINDOW_SECS: u64 = 60;
const USER_WINDOW_SECS: u64 = 3600;

/// Safe fallback for a bucket whose key is unknown: a provider not
/// present in the table, or a tier not recognized.
pub const FALLBACK_LIMIT: WindowLimit = WindowLimit::new(1_000, 100_000, 60);

pub const DEFAULT_SESSION_LIMIT: SessionLimit =
    SessionLimit { requests_per_window: 100, window: Duration::from_secs(60) };

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub provider_limits: HashMap<String, WindowLimit>,
    pub tier_limits: HashMap<String, WindowLimit>,
    pub session_limit: SessionLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut provider_limits = HashMap::new();
        provider_limits.insert("openai".to_string(), WindowLimit::new(3_000, 250_000, PROVIDER_WINDOW_SECS));
        provider_limits.insert("anthropic".to_string(), WindowLimit::new(1_000, 100_000, PROVIDER_WINDOW_SECS));
        provider_limits.insert("cohere".to_string(), WindowLimit::new(500, 50_000, PROVIDER_WINDOW_SECS));

        let mut tier_limits = HashMap::new();
        tier_limits.insert("free".to_string(), WindowLimit::new(100, 10_000, USER_WINDOW_SECS));
        tier_limits.insert("premium".to_string(), WindowLimit::new(1_000, 100_000, USER_WINDOW_SECS));
        tier_limits.insert("enterprise".to_string(), WindowLimit::new(10_000, 1_000_000, USER_WINDOW_SECS));

        Self { provider_limits, tier_limits, session_limit: DEFAULT_SESSION_LIMIT }
    }
}

impl RateLimitConfig {
    pub fn provider_limit(&self, provider_id: &str) -> WindowLimit {
        self.provider_limits.get(provider_id).copied().unwrap_or(FALLBACK_LIMIT)
    }

    pub fn tier_limit(&self, tier: &str) -> WindowLimit {
        self.tier_limits.get(tier).copied().unwrap_or(FALLBACK_LIMIT)
    }
}
