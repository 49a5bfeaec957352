//! Router: owns the authoritative provider map and dispatches to a
//! configurable selection strategy.

use crate::error::RouterError;
use crate::strategy::{
    CapabilityBasedStrategy, ConsistentHashStrategy, LeastConnectionsStrategy, RoundRobinStrategy,
    StrategyKind, WeightedStrategy,
};
use fleet_ring::{HashAlgorithm, HashRing, DEFAULT_VIRTUAL_NODES};
use fleet_telemetry::RoutingMetrics;
use fleet_types::{Provider, ProviderDescriptor, ProviderId, RequestDescriptor, SharedClock};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub weight: u32,
    pub health_score: f64,
    pub active_connections: u64,
    pub is_draining: bool,
}

impl From<&Provider> for ProviderSnapshot {
    fn from(p: &Provider) -> Self {
        Self {
            id: p.id.clone(),
            weight: p.weight,
            health_score: p.health_score,
            active_connections: p.active_connections,
            is_draining: p.is_draining,
        }
    }
}

struct Strategies {
    round_robin: RoundRobinStrategy,
    weighted: WeightedStrategy,
    least_connections: LeastConnectionsStrategy,
    consistent_hash: ConsistentHashStrategy,
    capability_based: CapabilityBasedStrategy,
}

pub struct Router {
    clock: SharedClock,
    providers: RwLock<HashMap<ProviderId, Provider>>,
    ring: RwLock<HashRing>,
    active_strategy: RwLock<StrategyKind>,
    strategies: Strategies,
}

impl Router {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_strategy(clock, StrategyKind::default())
    }

    pub fn with_strategy(clock: SharedClock, strategy: StrategyKind) -> Self {
        Self {
            clock,
            providers: RwLock::new(HashMap::new()),
            ring: RwLock::new(HashRing::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::default())),
            active_strategy: RwLock::new(strategy),
            strategies: Strategies {
                round_robin: RoundRobinStrategy::new(),
                weighted: WeightedStrategy::new(0),
                least_connections: LeastConnectionsStrategy,
                consistent_hash: ConsistentHashStrategy,
                capability_based: CapabilityBasedStrategy::default(),
            },
        }
    }

    pub fn add_provider(&self, descriptor: ProviderDescriptor) -> Result<(), RouterError> {
        let id = descriptor.id.clone();
        let mut providers = self.providers.write();
        if providers.contains_key(&id) {
            return Err(RouterError::AlreadyRegistered(id));
        }
        providers.insert(id.clone(), Provider::from_descriptor(descriptor));
        self.ring.write().add(&id);
        info!(provider = %id, "registered provider");
        Ok(())
    }

    pub fn remove_provider(&self, id: &str) -> Result<(), RouterError> {
        let mut providers = self.providers.write();
        if providers.remove(id).is_none() {
            return Err(RouterError::UnknownProvider(id.to_string()));
        }
        self.ring.write().remove(&id.to_string());
        info!(provider = %id, "removed provider");
        Ok(())
    }

    pub fn set_health(&self, id: &str, score: f64) -> Result<(), RouterError> {
        let mut providers = self.providers.write();
        let provider = providers.get_mut(id).ok_or_else(|| RouterError::UnknownProvider(id.to_string()))?;
        provider.set_health_score(score);
        Ok(())
    }

    pub fn set_routing_strategy(&self, strategy: StrategyKind) {
        *self.active_strategy.write() = strategy;
    }

    pub fn set_draining(&self, id: &str, draining: bool) -> Result<(), RouterError> {
        let mut providers = self.providers.write();
        let provider = providers.get_mut(id).ok_or_else(|| RouterError::UnknownProvider(id.to_string()))?;
        provider.is_draining = draining;
        Ok(())
    }

    pub fn set_failover_target(&self, id: &str, target: Option<ProviderId>) -> Result<(), RouterError> {
        let mut providers = self.providers.write();
        let provider = providers.get_mut(id).ok_or_else(|| RouterError::UnknownProvider(id.to_string()))?;
        provider.failover_target = target;
        Ok(())
    }

    pub fn update_connection_count(&self, id: &str, delta: i64) -> Result<(), RouterError> {
        let mut providers = self.providers.write();
        let provider = providers.get_mut(id).ok_or_else(|| RouterError::UnknownProvider(id.to_string()))?;
        if delta >= 0 {
            for _ in 0..delta {
                provider.increment_connections();
            }
        } else {
            for _ in 0..delta.unsigned_abs() {
                provider.decrement_connections();
            }
        }
        Ok(())
    }

    pub fn route(&self, request: &RequestDescriptor) -> Result<ProviderId, RouterError> {
        let strategy = *self.active_strategy.read();
        let strategy_label = strategy.as_str();
        let started = Instant::now();

        let providers = self.providers.read();
        let healthy: Vec<&Provider> = providers.values().filter(|p| p.is_healthy()).collect();
        if healthy.is_empty() {
            warn!("no healthy providers available for routing");
            RoutingMetrics::record_rejection(strategy_label);
            return Err(RouterError::NoAvailableProviders);
        }

        let selected = match strategy {
            StrategyKind::RoundRobin => self.strategies.round_robin.select(&healthy),
            StrategyKind::Weighted => self.strategies.weighted.select(&healthy),
            StrategyKind::LeastConnections => self.strategies.least_connections.select(&healthy),
            StrategyKind::ConsistentHash => {
                let ring = self.ring.read();
                self.strategies.consistent_hash.select(&healthy, request, &ring, &self.strategies.weighted)
            }
            StrategyKind::CapabilityBased => self.strategies.capability_based.select(&healthy, request),
        };

        drop(providers);

        match selected {
            Some(id) => {
                let mut providers = self.providers.write();
                if let Some(p) = providers.get_mut(&id) {
                    p.last_used = Some(self.clock.now());
                }
                drop(providers);
                RoutingMetrics::record_decision(strategy_label, &id, started.elapsed());
                Ok(id)
            }
            None => {
                RoutingMetrics::record_rejection(strategy_label);
                Err(RouterError::NoAvailableProviders)
            }
        }
    }

    pub fn provider_stats(&self) -> HashMap<ProviderId, ProviderSnapshot> {
        self.providers.read().iter().map(|(id, p)| (id.clone(), ProviderSnapshot::from(p))).collect()
    }

    pub fn get_provider(&self, id: &str) -> Option<Provider> {
        self.providers.read().get(id).cloned()
    }

    pub fn ring_stats(&self) -> fleet_ring::RingStats {
        self.ring.read().stats()
    }

    pub fn healthy_provider_ids(&self) -> Vec<ProviderId> {
        self.providers.read().values().filter(|p| p.is_healthy()).map(|p| p.id.clone()).collect()
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{Capabilities, CostMetrics, ManualClock, PerformanceMetrics};
    use std::sync::Arc;

    fn descriptor(id: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            capabilities: Capabilities::default(),
            cost_metrics: CostMetrics::default(),
            performance_metrics: PerformanceMetrics::default(),
            weight: 100,
        }
    }

    fn router() -> Router {
        Router::new(Arc::new(ManualClock::new()))
    }

    #[test]
    fn route_with_no_providers_is_no_available_providers() {
        let router = router();
        let err = router.route(&RequestDescriptor::default()).unwrap_err();
        assert_eq!(err, RouterError::NoAvailableProviders);
    }

    #[test]
    fn route_skips_unhealthy_and_draining_providers() {
        let router = router();
        router.add_provider(descriptor("healthy")).unwrap();
        router.add_provider(descriptor("sick")).unwrap();
        router.add_provider(descriptor("draining")).unwrap();
        router.set_health("sick", 0.1).unwrap();
        router.set_draining("draining", true).unwrap();

        for _ in 0..10 {
            assert_eq!(router.route(&RequestDescriptor::default()).unwrap(), "healthy");
        }
    }

    #[test]
    fn adding_the_same_provider_twice_errors() {
        let router = router();
        router.add_provider(descriptor("p1")).unwrap();
        assert_eq!(router.add_provider(descriptor("p1")).unwrap_err(), RouterError::AlreadyRegistered("p1".to_string()));
    }

    #[test]
    fn remove_provider_clears_it_from_the_ring() {
        let router = router();
        router.add_provider(descriptor("p1")).unwrap();
        assert!(router.ring_stats().node_count == 1);
        router.remove_provider("p1").unwrap();
        assert_eq!(router.ring_stats().node_count, 0);
    }

    #[test]
    fn round_robin_strategy_alternates_across_providers() {
        let router = router();
        router.set_routing_strategy(StrategyKind::RoundRobin);
        router.add_provider(descriptor("a")).unwrap();
        router.add_provider(descriptor("b")).unwrap();

        let first = router.route(&RequestDescriptor::default()).unwrap();
        let second = router.route(&RequestDescriptor::default()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn update_connection_count_is_reflected_in_least_connections_strategy() {
        let router = router();
        router.set_routing_strategy(StrategyKind::LeastConnections);
        router.add_provider(descriptor("a")).unwrap();
        router.add_provider(descriptor("b")).unwrap();
        router.update_connection_count("a", 5).unwrap();

        assert_eq!(router.route(&RequestDescriptor::default()).unwrap(), "b");
    }
}
