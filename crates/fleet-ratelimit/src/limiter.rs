//! Multi-scope rate limiter.

use crate::bucket::{Bucket, BucketKey, Resource, Scope};
use crate::config::RateLimitConfig;
use dashmap::DashMap;
use fleet_telemetry::RateLimitMetrics;
use fleet_types::{ProviderId, SharedClock, Timestamp};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Which scope denied admission, in the fixed evaluation order from
/// evaluation order. The first denial wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyingScope {
    ProviderRequests,
    ProviderTokens,
    UserRequests,
    UserTokens,
    SessionRequests,
}

impl DenyingScope {
    fn as_str(self) -> &'static str {
        match self {
            DenyingScope::ProviderRequests => "provider_requests",
            DenyingScope::ProviderTokens => "provider_tokens",
            DenyingScope::UserRequests => "user_requests",
            DenyingScope::UserTokens => "user_tokens",
            DenyingScope::SessionRequests => "session_requests",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: Timestamp,
    pub denying_scope: Option<DenyingScope>,
}

/// Input to `RateLimiter::check`.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub provider_id: ProviderId,
    pub user_id: Option<String>,
    pub user_tier: Option<String>,
    pub session_id: Option<String>,
    pub estimated_tokens: u64,
}

/// Input to `RateLimiter::record`. Carries `user_tier` so a bucket can
/// never be lazily created (or left) at the wrong size just because
/// `record` observes a scope before `check` does.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub provider_id: ProviderId,
    pub user_id: Option<String>,
    pub user_tier: Option<String>,
    pub session_id: Option<String>,
    pub tokens_used: u64,
    pub success: bool,
}

/// Live remaining counts for every scope relevant to a (provider, user)
/// pair, returned by `status`. These are live values, not a static
/// ceiling, since buckets roll over between calls.
#[derive(Debug, Clone)]
pub struct RateStatus {
    pub provider_requests_remaining: u64,
    pub provider_tokens_remaining: u64,
    pub user_requests_remaining: Option<u64>,
    pub user_tokens_remaining: Option<u64>,
}

/// Multi-scope token and request budget enforcement.
///
/// `check` is synchronous and touches only in-memory state, no network
/// I/O. On an internal bookkeeping error the limiter fails *open*
/// (admits the request) and logs: availability wins over strict
/// compliance, and the caller still observes the upstream provider's
/// own rate-limit response if one exists.
pub struct RateLimiter {
    clock: SharedClock,
    config: RwLock<RateLimitConfig>,
    buckets: DashMap<BucketKey, Bucket>,
}

impl RateLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock, config: RwLock::new(RateLimitConfig::default()), buckets: DashMap::new() }
    }

    pub fn with_config(clock: SharedClock, config: RateLimitConfig) -> Self {
        Self { clock, config: RwLock::new(config), buckets: DashMap::new() }
    }

    pub fn update_limits(&self, config: RateLimitConfig) {
        *self.config.write() = config;
    }

    /// Looks up (or lazily creates) a bucket and syncs its limit/window to
    /// the caller's current view of the config before touching it, so a
    /// bucket created with one caller's limit is resized the moment a
    /// caller with the real tier/provider limit observes it.
    fn peek(&self, key: BucketKey, limit: u64, window: Duration) -> (u64, Timestamp) {
        let now = self.clock.now();
        let mut entry = self.buckets.entry(key).or_insert_with(|| Bucket::new(limit, window, now));
        entry.update_limit(limit, window);
        entry.peek(now)
    }

    fn consume(&self, key: BucketKey, limit: u64, window: Duration, amount: u64) {
        let now = self.clock.now();
        let mut entry = self.buckets.entry(key).or_insert_with(|| Bucket::new(limit, window, now));
        entry.update_limit(limit, window);
        entry.consume(amount, now);
    }

    /// Evaluates the five budgets in a fixed order: provider_requests,
    /// provider_tokens, user_requests, user_tokens, session_requests.
    /// The first denial wins.
    pub fn check(&self, request: AdmissionRequest) -> AdmissionDecision {
        let config = self.config.read();
        let provider_limit = config.provider_limit(&request.provider_id);
        let tier_limit = request
            .user_tier
            .as_deref()
            .map(|tier| config.tier_limit(tier))
            .unwrap_or(crate::config::FALLBACK_LIMIT);
        let session_limit = config.session_limit;
        drop(config);

        // provider_requests
        let (provider_req_remaining, provider_req_reset) = self.peek(
            BucketKey::new(Scope::Provider, request.provider_id.clone(), Resource::Requests),
            provider_limit.requests_per_window,
            provider_limit.window,
        );
        if provider_req_remaining < 1 {
            return deny(DenyingScope::ProviderRequests, provider_req_remaining, provider_req_reset);
        }

        // provider_tokens
        let (provider_tok_remaining, provider_tok_reset) = self.peek(
            BucketKey::new(Scope::Provider, request.provider_id.clone(), Resource::Tokens),
            provider_limit.tokens_per_window,
            provider_limit.window,
        );
        if provider_tok_remaining < request.estimated_tokens {
            return deny(DenyingScope::ProviderTokens, provider_tok_remaining, provider_tok_reset);
        }

        // user_requests / user_tokens: skipped (admitted) when there's no user id
        if let Some(user_id) = request.user_id.as_deref() {
            let (user_req_remaining, user_req_reset) = self.peek(
                BucketKey::new(Scope::User, user_id, Resource::Requests),
                tier_limit.requests_per_window,
                tier_limit.window,
            );
            if user_req_remaining < 1 {
                return deny(DenyingScope::UserRequests, user_req_remaining, user_req_reset);
            }

            let (user_tok_remaining, user_tok_reset) = self.peek(
                BucketKey::new(Scope::User, user_id, Resource::Tokens),
                tier_limit.tokens_per_window,
                tier_limit.window,
            );
            if user_tok_remaining < request.estimated_tokens {
                return deny(DenyingScope::UserTokens, user_tok_remaining, user_tok_reset);
            }
        }

        // session_requests: skipped (admitted) when there's no session id
        if let Some(session_id) = request.session_id.as_deref() {
            let (session_remaining, session_reset) = self.peek(
                BucketKey::new(Scope::Session, session_id, Resource::Requests),
                session_limit.requests_per_window,
                session_limit.window,
            );
            if session_remaining < 1 {
                return deny(DenyingScope::SessionRequests, session_remaining, session_reset);
            }
        }

        debug!(provider = %request.provider_id, "rate limiter admitted request");
        RateLimitMetrics::record_admission(&request.provider_id);
        AdmissionDecision {
            allowed: true,
            remaining: provider_req_remaining,
            reset_at: provider_req_reset,
            denying_scope: None,
        }
    }

    /// Consumes usage from every applicable bucket on success. Resolves
    /// the user's tier limit the same way `check` does, so a bucket
    /// `record` creates (or touches) before `check` ever runs for that
    /// scope is still sized to the real tier, not the unknown-tier
    /// fallback.
    pub fn record(&self, usage: UsageRecord) {
        if !usage.success {
            return;
        }

        let config = self.config.read();
        let provider_limit = config.provider_limit(&usage.provider_id);
        let tier_limit = usage.user_tier.as_deref().map(|tier| config.tier_limit(tier)).unwrap_or(crate::config::FALLBACK_LIMIT);
        let session_limit = config.session_limit;
        drop(config);

        self.consume(
            BucketKey::new(Scope::Provider, usage.provider_id.clone(), Resource::Requests),
            provider_limit.requests_per_window,
            provider_limit.window,
            1,
        );
        self.consume(
            BucketKey::new(Scope::Provider, usage.provider_id.clone(), Resource::Tokens),
            provider_limit.tokens_per_window,
            provider_limit.window,
            usage.tokens_used,
        );

        if let Some(user_id) = usage.user_id.as_deref() {
            self.consume(
                BucketKey::new(Scope::User, user_id, Resource::Requests),
                tier_limit.requests_per_window,
                tier_limit.window,
                1,
            );
            self.consume(
                BucketKey::new(Scope::User, user_id, Resource::Tokens),
                tier_limit.tokens_per_window,
                tier_limit.window,
                usage.tokens_used,
            );
        }

        if let Some(session_id) = usage.session_id.as_deref() {
            self.consume(
                BucketKey::new(Scope::Session, session_id, Resource::Requests),
                session_limit.requests_per_window,
                session_limit.window,
                1,
            );
        }
    }

    /// Reports remaining budget without consuming any of it. Takes
    /// `user_tier` for the same reason `check` and `record` do: `peek`
    /// syncs a bucket's size to whatever limit it's called with, so
    /// calling this with the unknown-tier fallback would wrongly shrink
    /// a bucket `check`/`record` already sized to the user's real tier.
    pub fn status(
        &self,
        provider_id: &str,
        user_id: Option<&str>,
        user_tier: Option<&str>,
    ) -> RateStatus {
        let config = self.config.read();
        let provider_limit = config.provider_limit(provider_id);
        let tier_limit = user_tier.map(|tier| config.tier_limit(tier)).unwrap_or(crate::config::FALLBACK_LIMIT);
        drop(config);

        let (provider_requests_remaining, _) = self.peek(
            BucketKey::new(Scope::Provider, provider_id, Resource::Requests),
            provider_limit.requests_per_window,
            provider_limit.window,
        );
        let (provider_tokens_remaining, _) = self.peek(
            BucketKey::new(Scope::Provider, provider_id, Resource::Tokens),
            provider_limit.tokens_per_window,
            provider_limit.window,
        );

        let (user_requests_remaining, user_tokens_remaining) = if let Some(user_id) = user_id {
            let (req, _) = self.peek(
                BucketKey::new(Scope::User, user_id, Resource::Requests),
                tier_limit.requests_per_window,
                tier_limit.window,
            );
            let (tok, _) = self.peek(
                BucketKey::new(Scope::User, user_id, Resource::Tokens),
                tier_limit.tokens_per_window,
                tier_limit.window,
            );
            (Some(req), Some(tok))
        } else {
            (None, None)
        };

        RateStatus {
            provider_requests_remaining,
            provider_tokens_remaining,
            user_requests_remaining,
            user_tokens_remaining,
        }
    }
}

fn deny(scope: DenyingScope, remaining: u64, reset_at: Timestamp) -> AdmissionDecision {
    warn!(?scope, remaining, "rate limiter denied request");
    RateLimitMetrics::record_denial(scope.as_str());
    AdmissionDecision { allowed: false, remaining, reset_at, denying_scope: Some(scope) }
}
