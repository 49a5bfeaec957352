//! Monotonic time abstraction
//!
//! Every timing-sensitive component (circuit timeouts, drain timers, rate
//! limiter windows) compares against a `Clock` rather than calling
//! `std::time::Instant::now()` directly, so tests can advance time
//! deterministically instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A point in time, expressed as an offset from a clock's own epoch.
///
/// Deliberately not `std::time::Instant`: that type has no public
/// constructor, which makes it impossible to build a test clock that can
/// be set to an arbitrary value rather than just advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_duration(d: Duration) -> Self {
        Timestamp(d)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// `self - earlier`, saturating at zero if `earlier` is actually later.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    pub fn checked_add(&self, d: Duration) -> Option<Timestamp> {
        self.0.checked_add(d).map(Timestamp)
    }
}

/// Injectable source of monotonic time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Production clock, backed by `std::time::Instant`.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.epoch.elapsed())
    }
}

/// A clock a test can set and advance by hand.
///
/// Cloning shares the same underlying counter (it's an `Arc` internally),
/// so a single `ManualClock` can be handed to several components and they
/// will all observe the same advances.
#[derive(Debug, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { nanos: Arc::new(AtomicU64::new(0)) }
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, t: Timestamp) {
        self.nanos.store(t.as_duration().as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(Duration::from_nanos(self.nanos.load(Ordering::SeqCst)))
    }
}

/// A shared, type-erased clock handle threaded through every component.
pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_monotonically() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        let t1 = clock.now();
        assert_eq!(t1.saturating_duration_since(t0), Duration::from_secs(5));
    }

    #[test]
    fn manual_clock_clones_share_state() {
        let clock = ManualClock::new();
        let clone = clock.clone();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clone.now(), clock.now());
    }

    #[test]
    fn saturating_duration_since_never_underflows() {
        let t_early = Timestamp::from_duration(Duration::from_secs(1));
        let t_late = Timestamp::from_duration(Duration::from_secs(5));
        assert_eq!(t_early.saturating_duration_since(t_late), Duration::ZERO);
    }
}
