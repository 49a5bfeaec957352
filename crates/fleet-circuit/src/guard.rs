//! RAII alternative to `CircuitBreaker::call` for callers that can't
//! restructure their call site into a single awaited future (e.g. a
//! streaming response whose outcome is only known after several other
//! calls have happened in between).

use crate::breaker::CircuitBreaker;
use crate::error::CircuitCallError;
use std::convert::Infallible;
use tracing::warn;

/// Holds an admitted circuit open until the caller reports an outcome.
/// Dropping the guard without calling `success` or `failure` records a
/// failure: a caller that forgot to resolve it is indistinguishable from
/// one whose in-flight work never completed, and the breaker should lean
/// toward tripping rather than staying falsely closed.
pub struct CircuitBreakerGuard<'a> {
    breaker: &'a CircuitBreaker,
    provider_id: String,
    resolved: bool,
}

impl CircuitBreaker {
    pub fn guard(&self, provider_id: &str) -> Result<CircuitBreakerGuard<'_>, CircuitCallError<Infallible>> {
        self.try_admit(provider_id)?;
        Ok(CircuitBreakerGuard { breaker: self, provider_id: provider_id.to_string(), resolved: false })
    }
}

impl<'a> CircuitBreakerGuard<'a> {
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success(&self.provider_id);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record_failure(&self.provider_id);
    }
}

impl<'a> Drop for CircuitBreakerGuard<'a> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(provider = %self.provider_id, "circuit guard dropped without a resolution, recording failure");
            self.breaker.record_failure(&self.provider_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitConfig;
    use crate::state::CircuitState;
    use fleet_types::ManualClock;
    use std::sync::Arc;

    #[test]
    fn explicit_success_does_not_count_as_a_failure() {
        let breaker = CircuitBreaker::new(Arc::new(ManualClock::new()));
        let guard = breaker.guard("p1").unwrap();
        guard.success();
        assert_eq!(breaker.get_info("p1").failure_count, 0);
    }

    #[test]
    fn dropping_without_resolving_counts_as_a_failure() {
        let breaker = CircuitBreaker::with_config(
            Arc::new(ManualClock::new()),
            CircuitConfig { failure_threshold: 1, ..CircuitConfig::default() },
        );
        {
            let _guard = breaker.guard("p1").unwrap();
        }
        assert_eq!(breaker.get_state("p1"), CircuitState::Open);
    }

    #[test]
    fn explicit_failure_trips_the_circuit() {
        let breaker = CircuitBreaker::with_config(
            Arc::new(ManualClock::new()),
            CircuitConfig { failure_threshold: 1, ..CircuitConfig::default() },
        );
        let guard = breaker.guard("p1").unwrap();
        guard.failure();
        assert_eq!(breaker.get_state("p1"), CircuitState::Open);
    }
}
