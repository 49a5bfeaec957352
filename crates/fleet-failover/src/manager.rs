//! Periodic health sweep and drain/promote/rebalance orchestration.

use crate::config::{FailoverConfig, FailoverStrategy};
use crate::error::FailoverError;
use crate::stats::{FailoverSnapshot, FailoverStats, ProviderStatus};
use fleet_circuit::{CircuitBreaker, CircuitState};
use fleet_router::Router;
use fleet_telemetry::FailoverMetrics;
use fleet_types::{ProviderId, SharedClock, Timestamp};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MIN_CONSECUTIVE_FAILURES_FOR_AUTO_FAILOVER: u32 = 3;
const MAX_HEALTH_SCORE_FOR_AUTO_FAILOVER: f64 = 0.3;

/// Reads provider and circuit state through the Router and Circuit
/// Breaker's own APIs. It mutates the Router through
/// `set_draining` / `set_failover_target` / `remove_provider`, and
/// mutates the Circuit Breaker only by driving its time-based sweep
/// (`CircuitBreaker::sweep`) so Open/HalfOpen timeouts fire even when a
/// provider receives no traffic.
pub struct FailoverManager {
    clock: SharedClock,
    router: Arc<Router>,
    circuit_breaker: Arc<CircuitBreaker>,
    config: RwLock<FailoverConfig>,
    consecutive_failures: RwLock<HashMap<ProviderId, u32>>,
    active_failovers: RwLock<HashSet<ProviderId>>,
    drain_deadlines: RwLock<HashMap<ProviderId, Timestamp>>,
    stats: RwLock<FailoverStats>,
    last_rebalance_time: RwLock<Option<Timestamp>>,
}

impl FailoverManager {
    pub fn new(clock: SharedClock, router: Arc<Router>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self::with_config(clock, router, circuit_breaker, FailoverConfig::default())
    }

    pub fn with_config(
        clock: SharedClock,
        router: Arc<Router>,
        circuit_breaker: Arc<CircuitBreaker>,
        config: FailoverConfig,
    ) -> Self {
        Self {
            clock,
            router,
            circuit_breaker,
            config: RwLock::new(config),
            consecutive_failures: RwLock::new(HashMap::new()),
            active_failovers: RwLock::new(HashSet::new()),
            drain_deadlines: RwLock::new(HashMap::new()),
            stats: RwLock::new(FailoverStats::default()),
            last_rebalance_time: RwLock::new(None),
        }
    }

    fn status_of(&self, id: &ProviderId) -> Option<ProviderStatus> {
        let provider = self.router.get_provider(id)?;
        let health_score = self.circuit_breaker.health_score(id);
        let circuit_state = self.circuit_breaker.get_state(id);

        let mut consecutive = self.consecutive_failures.write();
        let counter = consecutive.entry(id.clone()).or_insert(0);
        if health_score < 0.5 {
            *counter += 1;
        } else {
            *counter = 0;
        }

        Some(ProviderStatus {
            health_score,
            circuit_state,
            active_connections: provider.active_connections,
            consecutive_failures: *counter,
            is_draining: provider.is_draining,
            failover_target: provider.failover_target,
        })
    }

    /// One evaluation pass: apply any time-based circuit transitions so
    /// state isn't stale when no traffic arrives, recompute status, warn
    /// on low fleet headroom, force-complete any expired drains, and
    /// trigger automatic failovers for providers that qualify.
    pub fn sweep_once(&self) {
        self.circuit_breaker.sweep();
        self.force_complete_expired_drains();

        let ids = self.router.provider_ids();
        let mut statuses = HashMap::new();
        for id in &ids {
            if let Some(status) = self.status_of(id) {
                statuses.insert(id.clone(), status);
            }
        }

        let healthy_count =
            statuses.values().filter(|s| s.health_score >= 0.7 && s.circuit_state != CircuitState::Open).count();
        FailoverMetrics::update_healthy_providers(healthy_count as u64);
        let min_healthy = self.config.read().min_healthy_providers as usize;
        if healthy_count < min_healthy {
            warn!(healthy_count, min_healthy, "fleet healthy-provider count below configured minimum");
        }

        for (id, status) in &statuses {
            let unhealthy = status.health_score < 0.5 || status.circuit_state == CircuitState::Open;
            if !unhealthy || status.is_draining {
                continue;
            }
            if self.active_failovers.read().contains(id) {
                continue;
            }
            if status.consecutive_failures >= MIN_CONSECUTIVE_FAILURES_FOR_AUTO_FAILOVER
                && status.health_score < MAX_HEALTH_SCORE_FOR_AUTO_FAILOVER
            {
                self.trigger_failover(id, status.circuit_state);
            }
        }
    }

    fn select_target(&self, failing_id: &ProviderId) -> Option<ProviderId> {
        self.router
            .provider_ids()
            .into_iter()
            .filter(|id| id != failing_id)
            .filter_map(|id| self.router.get_provider(&id).map(|p| (id, p)))
            .filter(|(_, p)| p.is_healthy() && !p.is_draining)
            .min_by_key(|(id, p)| (p.active_connections, id.clone()))
            .map(|(id, _)| id)
    }

    fn trigger_failover(&self, id: &ProviderId, circuit_state: CircuitState) {
        let strategy = self.config.read().strategy;
        let effective = match strategy {
            FailoverStrategy::Immediate => FailoverStrategy::Immediate,
            FailoverStrategy::Graceful => FailoverStrategy::Graceful,
            FailoverStrategy::CircuitBreakerGuided => {
                if circuit_state == CircuitState::Open {
                    FailoverStrategy::Immediate
                } else {
                    FailoverStrategy::Graceful
                }
            }
        };

        self.active_failovers.write().insert(id.clone());
        let started_at = self.clock.now();

        let target = match self.select_target(id) {
            Some(target) => target,
            None => {
                warn!(provider = %id, "no healthy alternative found for failover");
                self.stats.write().record_attempt(false, 0.0);
                FailoverMetrics::record_attempt(false);
                self.active_failovers.write().remove(id);
                return;
            }
        };

        match effective {
            FailoverStrategy::Immediate => {
                let _ = self.router.set_failover_target(id, Some(target.clone()));
                let removed = self.router.remove_provider(id).is_ok();
                let elapsed = self.clock.now().saturating_duration_since(started_at).as_secs_f64() * 1000.0;
                self.stats.write().record_attempt(removed, elapsed);
                FailoverMetrics::record_attempt(removed);
                self.active_failovers.write().remove(id);
                info!(provider = %id, target = %target, "immediate failover complete");
            }
            FailoverStrategy::Graceful => {
                let _ = self.router.set_failover_target(id, Some(target.clone()));
                let _ = self.router.set_draining(id, true);
                let deadline = started_at.checked_add(self.config.read().drain_timeout).unwrap_or(started_at);
                self.drain_deadlines.write().insert(id.clone(), deadline);
                self.stats.write().record_attempt(true, 0.0);
                FailoverMetrics::record_attempt(true);
                self.active_failovers.write().remove(id);
                info!(provider = %id, target = %target, "graceful drain started");
            }
            FailoverStrategy::CircuitBreakerGuided => unreachable!("resolved above"),
        }
    }

    pub fn start_drain(&self, id: &str, target: Option<ProviderId>) {
        let now = self.clock.now();
        let _ = self.router.set_draining(id, true);
        if let Some(target) = target {
            let _ = self.router.set_failover_target(id, Some(target));
        }
        let deadline = now.checked_add(self.config.read().drain_timeout).unwrap_or(now);
        self.drain_deadlines.write().insert(id.to_string(), deadline);
    }

    pub fn end_drain(&self, id: &str) {
        self.drain_deadlines.write().remove(id);
        let _ = self.router.set_draining(id, false);
    }

    fn force_complete_expired_drains(&self) {
        let now = self.clock.now();
        let expired: Vec<ProviderId> = self
            .drain_deadlines
            .read()
            .iter()
            .filter(|&(_, deadline)| now >= *deadline)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            self.drain_deadlines.write().remove(&id);
            if self.router.remove_provider(&id).is_ok() {
                info!(provider = %id, "drain timer fired, provider force-removed");
            }
        }
    }

    /// Recomputes the average connection count across healthy providers
    /// and resets `last_rebalance_time`. Does not itself migrate
    /// in-flight connections.
    pub fn rebalance(&self) -> f64 {
        let ids = self.router.healthy_provider_ids();
        let total: u64 = ids.iter().filter_map(|id| self.router.get_provider(id)).map(|p| p.active_connections).sum();
        let avg = if ids.is_empty() { 0.0 } else { total as f64 / ids.len() as f64 };
        *self.last_rebalance_time.write() = Some(self.clock.now());
        info!(avg_connections = avg, healthy_count = ids.len(), "rebalance computed");
        avg
    }

    pub fn last_rebalance_time(&self) -> Option<Timestamp> {
        *self.last_rebalance_time.read()
    }

    pub fn stats(&self) -> FailoverSnapshot {
        let per_provider = self
            .router
            .provider_ids()
            .iter()
            .filter_map(|id| self.status_of(id).map(|s| (id.clone(), s)))
            .collect();
        FailoverSnapshot { stats: self.stats.read().clone(), per_provider }
    }

    pub fn select_failover_target_for(&self, id: &ProviderId) -> Result<ProviderId, FailoverError> {
        self.select_target(id).ok_or_else(|| FailoverError::NoHealthyAlternatives(id.clone()))
    }

    /// Runs `sweep_once` on `interval` until the returned handle is
    /// dropped or the task is aborted.
    pub fn run(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_once();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{Capabilities, CostMetrics, ManualClock, PerformanceMetrics, ProviderDescriptor};

    fn descriptor(id: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            capabilities: Capabilities::default(),
            cost_metrics: CostMetrics::default(),
            performance_metrics: PerformanceMetrics::default(),
            weight: 100,
        }
    }

    fn harness() -> (Arc<Router>, Arc<CircuitBreaker>, FailoverManager, ManualClock) {
        let clock = ManualClock::new();
        let shared = Arc::new(clock.clone());
        let router = Arc::new(Router::new(shared.clone()));
        let breaker = Arc::new(CircuitBreaker::new(shared.clone()));
        let manager = FailoverManager::new(shared, router.clone(), breaker.clone());
        (router, breaker, manager, clock)
    }

    /// Provider p has a low health score and an open circuit for at
    /// least three sweep cycles. With the default CircuitBreakerGuided
    /// strategy and one other healthy provider q, the manager triggers
    /// an immediate failover: p is removed and successful_failovers
    /// increments by exactly one.
    #[test]
    fn automatic_failover_removes_a_provider_with_open_circuit() {
        let (router, breaker, manager, _clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        router.add_provider(descriptor("q")).unwrap();
        breaker.force_open("p");

        for _ in 0..3 {
            manager.sweep_once();
        }

        assert!(router.get_provider("p").is_none());
        assert!(router.get_provider("q").is_some());
        assert_eq!(manager.stats().stats.successful_failovers, 1);
    }

    #[test]
    fn healthy_fleet_triggers_no_failovers() {
        let (router, _breaker, manager, _clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        router.add_provider(descriptor("q")).unwrap();

        manager.sweep_once();

        assert!(router.get_provider("p").is_some());
        assert!(router.get_provider("q").is_some());
        assert_eq!(manager.stats().stats.total_failovers, 0);
    }

    #[test]
    fn graceful_drain_times_out_and_force_removes() {
        let (router, _breaker, manager, clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        router.add_provider(descriptor("q")).unwrap();

        manager.start_drain("p", Some("q".to_string()));
        assert!(router.get_provider("p").unwrap().is_draining);
        assert!(router.route(&fleet_types::RequestDescriptor::default()).unwrap() == "q");

        clock.advance(Duration::from_secs(61));
        manager.sweep_once();

        assert!(router.get_provider("p").is_none());
    }

    #[test]
    fn end_drain_cancels_the_timer() {
        let (router, _breaker, manager, clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        manager.start_drain("p", None);
        manager.end_drain("p");

        clock.advance(Duration::from_secs(120));
        manager.sweep_once();

        assert!(router.get_provider("p").is_some());
        assert!(!router.get_provider("p").unwrap().is_draining);
    }

    #[test]
    fn rebalance_reports_average_connections_and_resets_timestamp() {
        let (router, _breaker, manager, _clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        router.add_provider(descriptor("q")).unwrap();
        router.update_connection_count("p", 10).unwrap();

        assert!(manager.last_rebalance_time().is_none());
        let avg = manager.rebalance();
        assert_eq!(avg, 5.0);
        assert!(manager.last_rebalance_time().is_some());
    }

    #[test]
    fn selecting_a_target_with_no_alternatives_reports_the_right_error() {
        let (router, _breaker, manager, _clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        let err = manager.select_failover_target_for(&"p".to_string()).unwrap_err();
        assert_eq!(err, FailoverError::NoHealthyAlternatives("p".to_string()));
    }

    /// With no traffic at all past the circuit's open_timeout, a single
    /// sweep must still roll the circuit from Open to HalfOpen: the
    /// transition is time-based, not call-triggered.
    #[test]
    fn sweep_advances_circuit_state_with_no_traffic() {
        let (router, breaker, manager, clock) = harness();
        router.add_provider(descriptor("p")).unwrap();
        breaker.force_open("p");
        assert_eq!(breaker.get_state("p"), CircuitState::Open);

        clock.advance(Duration::from_secs(61));
        manager.sweep_once();

        assert_eq!(breaker.get_state("p"), CircuitState::HalfOpen);
    }
}
