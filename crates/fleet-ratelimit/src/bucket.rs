//! Bucket keying and the fixed-window counter primitive.

use fleet_types::Timestamp;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Provider,
    User,
    Session,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Requests,
    Tokens,
}

/// `(scope, identity, resource)`: the key a budget bucket is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub scope: Scope,
    pub identity: String,
    pub resource: Resource,
}

impl BucketKey {
    pub fn new(scope: Scope, identity: impl Into<String>, resource: Resource) -> Self {
        Self { scope, identity: identity.into(), resource }
    }
}

/// A fixed-window counter. The window resets wholesale once it elapses,
/// rather than decaying continuously, chosen over a sliding window
/// window keeps `remaining`/`reset_at` trivial to reason about and test.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub limit: u64,
    pub window: Duration,
    window_start: Timestamp,
    used: u64,
}

impl Bucket {
    pub fn new(limit: u64, window: Duration, now: Timestamp) -> Self {
        Self { limit, window, window_start: now, used: 0 }
    }

    /// Rolls the window over if it has elapsed. Idempotent within a window.
    fn roll(&mut self, now: Timestamp) {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.used = 0;
        }
    }

    /// Live remaining budget and the timestamp the window resets at,
    /// without consuming anything.
    pub fn peek(&mut self, now: Timestamp) -> (u64, Timestamp) {
        self.roll(now);
        let remaining = self.limit.saturating_sub(self.used);
        let reset_at = self.window_start.checked_add(self.window).unwrap_or(self.window_start);
        (remaining, reset_at)
    }

    /// Consumes `amount` from the current window, rolling over first if due.
    pub fn consume(&mut self, amount: u64, now: Timestamp) {
        self.roll(now);
        self.used = self.used.saturating_add(amount);
    }

    pub fn update_limit(&mut self, limit: u64, window: Duration) {
        self.limit = limit;
        self.window = window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bucket_has_full_capacity() {
        let mut b = Bucket::new(10, Duration::from_secs(60), Timestamp::ZERO);
        let (remaining, _) = b.peek(Timestamp::ZERO);
        assert_eq!(remaining, 10);
    }

    #[test]
    fn consume_reduces_remaining_within_window() {
        let mut b = Bucket::new(10, Duration::from_secs(60), Timestamp::ZERO);
        b.consume(3, Timestamp::from_duration(Duration::from_secs(1)));
        let (remaining, _) = b.peek(Timestamp::from_duration(Duration::from_secs(2)));
        assert_eq!(remaining, 7);
    }

    #[test]
    fn window_rolls_over_after_elapsing() {
        let mut b = Bucket::new(10, Duration::from_secs(60), Timestamp::ZERO);
        b.consume(10, Timestamp::ZERO);
        let (remaining_before, _) = b.peek(Timestamp::from_duration(Duration::from_secs(30)));
        assert_eq!(remaining_before, 0);

        let (remaining_after, _) = b.peek(Timestamp::from_duration(Duration::from_secs(61)));
        assert_eq!(remaining_after, 10);
    }

    #[test]
    fn update_limit_changes_capacity_without_resetting_usage() {
        let mut b = Bucket::new(10, Duration::from_secs(60), Timestamp::ZERO);
        b.consume(8, Timestamp::ZERO);
        b.update_limit(100, Duration::from_secs(3600));
        let (remaining, _) = b.peek(Timestamp::from_duration(Duration::from_secs(1)));
        assert_eq!(remaining, 92);
    }
}
