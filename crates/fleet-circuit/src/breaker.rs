//! Per-provider circuit breaker registry.

use crate::config::CircuitConfig;
use crate::error::CircuitCallError;
use crate::state::{Admission, Circuit, CircuitInfo, CircuitState};
use dashmap::DashMap;
use fleet_telemetry::{CircuitMetrics, CircuitStateLabel};
use fleet_types::{ProviderId, SharedClock};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

fn label_for(state: CircuitState) -> CircuitStateLabel {
    match state {
        CircuitState::Closed => CircuitStateLabel::Closed,
        CircuitState::HalfOpen => CircuitStateLabel::HalfOpen,
        CircuitState::Open => CircuitStateLabel::Open,
    }
}

/// Owns one `Circuit` per provider id, lazily created on first
/// observation. Each circuit is independently mutexed, so concurrent
/// calls against different providers never contend, and mutation within
/// a single circuit is totally ordered.
pub struct CircuitBreaker {
    clock: SharedClock,
    default_config: CircuitConfig,
    circuits: DashMap<ProviderId, Mutex<Circuit>>,
}

impl CircuitBreaker {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock, default_config: CircuitConfig::default(), circuits: DashMap::new() }
    }

    pub fn with_config(clock: SharedClock, default_config: CircuitConfig) -> Self {
        Self { clock, default_config, circuits: DashMap::new() }
    }

    fn entry(&self, provider_id: &str) -> dashmap::mapref::one::RefMut<'_, ProviderId, Mutex<Circuit>> {
        self.circuits
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(Circuit::new(self.default_config)))
    }

    /// Admission check only, with no coupling to completion. Used both
    /// by `call` and by `guard`, which reports its outcome later.
    pub(crate) fn try_admit<E>(&self, provider_id: &str) -> Result<(), CircuitCallError<E>> {
        let now = self.clock.now();
        let admission = {
            let circuit = self.entry(provider_id);
            let mut circuit = circuit.lock();
            circuit.admit(now)
        };

        match admission {
            Admission::RejectOpen => {
                debug!(provider = %provider_id, "circuit open, rejecting call");
                Err(CircuitCallError::CircuitOpen)
            }
            Admission::RejectHalfOpenTimeout => {
                warn!(provider = %provider_id, "half-open timeout elapsed, reopening circuit");
                Err(CircuitCallError::CircuitHalfOpenTimeout)
            }
            Admission::Admit => Ok(()),
        }
    }

    /// Wraps `fut`, gating admission on the circuit's current state and
    /// feeding the outcome back into it. Panics inside `fut` are caught
    /// and treated as failures, matching every other error outcome.
    pub async fn call<F, T, E>(&self, provider_id: &str, fut: F) -> Result<T, CircuitCallError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        self.try_admit(provider_id)?;

        let outcome = AssertUnwindSafe(fut).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                self.record_success(provider_id);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure(provider_id);
                Err(CircuitCallError::Inner(err))
            }
            Err(panic) => {
                self.record_failure(provider_id);
                warn!(provider = %provider_id, "call panicked, recorded as circuit failure");
                std::panic::resume_unwind(panic);
            }
        }
    }

    pub fn record_success(&self, provider_id: &str) {
        let now = self.clock.now();
        let circuit = self.entry(provider_id);
        let mut circuit = circuit.lock();
        circuit.record_success(now);
        CircuitMetrics::record_success(provider_id);
        CircuitMetrics::update_state(provider_id, label_for(circuit.state()));
        CircuitMetrics::update_health_score(provider_id, circuit.health_score(now));
    }

    pub fn record_failure(&self, provider_id: &str) {
        let now = self.clock.now();
        let circuit = self.entry(provider_id);
        let mut circuit = circuit.lock();
        circuit.record_failure(now);
        CircuitMetrics::record_failure(provider_id);
        CircuitMetrics::update_state(provider_id, label_for(circuit.state()));
        CircuitMetrics::update_health_score(provider_id, circuit.health_score(now));
    }

    pub fn force_open(&self, provider_id: &str) {
        let now = self.clock.now();
        self.entry(provider_id).lock().force_open(now);
        CircuitMetrics::update_state(provider_id, CircuitStateLabel::Open);
    }

    pub fn force_close(&self, provider_id: &str) {
        self.entry(provider_id).lock().force_close();
        CircuitMetrics::update_state(provider_id, CircuitStateLabel::Closed);
    }

    pub fn get_state(&self, provider_id: &str) -> CircuitState {
        self.entry(provider_id).lock().state()
    }

    pub fn get_info(&self, provider_id: &str) -> CircuitInfo {
        self.entry(provider_id).lock().info()
    }

    pub fn health_score(&self, provider_id: &str) -> f64 {
        let now = self.clock.now();
        self.entry(provider_id).lock().health_score(now)
    }

    pub fn update_config(&self, provider_id: &str, config: CircuitConfig) {
        self.entry(provider_id).lock().set_config(config);
    }

    pub fn set_default_config(&mut self, config: CircuitConfig) {
        self.default_config = config;
    }

    pub fn remove(&self, provider_id: &str) {
        self.circuits.remove(provider_id);
    }

    /// Applies any time-based transition due at the current time to
    /// every known circuit, so state isn't stale when no traffic arrives.
    pub fn sweep(&self) {
        let now = self.clock.now();
        for entry in self.circuits.iter() {
            let mut circuit = entry.value().lock();
            circuit.admit(now);
            CircuitMetrics::update_state(entry.key(), label_for(circuit.state()));
            CircuitMetrics::update_health_score(entry.key(), circuit.health_score(now));
        }
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.circuits.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn breaker() -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::with_config(
            Arc::new(clock.clone()),
            CircuitConfig { failure_threshold: 2, ..CircuitConfig::default() },
        );
        (breaker, clock)
    }

    /// Two failures open the circuit; after `open_timeout` the next call
    /// transitions to half-open and, on enough successes, back to closed.
    #[tokio::test]
    async fn full_lifecycle_closed_open_half_open_closed() {
        let (breaker, clock) = breaker();

        for _ in 0..2 {
            let result: Result<(), CircuitCallError<&str>> =
                breaker.call("p1", async { Err("boom") }).await;
            assert!(result.is_err());
        }
        assert_eq!(breaker.get_state("p1"), CircuitState::Open);

        let rejected: Result<(), CircuitCallError<&str>> =
            breaker.call("p1", async { Ok(()) }).await;
        assert!(matches!(rejected, Err(CircuitCallError::CircuitOpen)));

        clock.advance(Duration::from_secs(60));

        for _ in 0..3 {
            let ok: Result<(), CircuitCallError<&str>> = breaker.call("p1", async { Ok(()) }).await;
            assert!(ok.is_ok());
        }
        assert_eq!(breaker.get_state("p1"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn failure_in_half_open_reopens_immediately() {
        let (breaker, clock) = breaker();
        breaker.force_open("p1");
        clock.advance(Duration::from_secs(61));
        let _: Result<(), CircuitCallError<&str>> = breaker.call("p1", async { Ok(()) }).await;
        assert_eq!(breaker.get_state("p1"), CircuitState::HalfOpen);

        let _: Result<(), CircuitCallError<&str>> = breaker.call("p1", async { Err("boom") }).await;
        assert_eq!(breaker.get_state("p1"), CircuitState::Open);
    }

    #[tokio::test]
    async fn panicking_call_is_recorded_as_failure() {
        let (breaker, _clock) = breaker();
        let result = std::panic::AssertUnwindSafe(breaker.call("p1", async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok::<(), &str>(())
        }))
        .catch_unwind()
        .await;
        assert!(result.is_err());
        assert_eq!(breaker.get_info("p1").failure_count, 1);
    }

    #[test]
    fn force_open_and_force_close_are_independent_of_traffic() {
        let (breaker, _clock) = breaker();
        breaker.force_open("p1");
        assert_eq!(breaker.get_state("p1"), CircuitState::Open);
        breaker.force_close("p1");
        assert_eq!(breaker.get_state("p1"), CircuitState::Closed);
    }

    #[test]
    fn sweep_transitions_open_circuit_to_half_open_without_a_call() {
        let (breaker, clock) = breaker();
        breaker.force_open("p1");
        clock.advance(Duration::from_secs(61));
        breaker.sweep();
        assert_eq!(breaker.get_state("p1"), CircuitState::HalfOpen);
    }
}
