//! Provider domain model: registry descriptors and live routing state.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// Opaque, hashable provider identifier, unique within the fleet.
pub type ProviderId = String;

/// Capabilities advertised by a provider's registry entry.
///
/// `request_types`, `features` and `user_tiers` are modelled as open
/// string atoms rather than closed enums: the set of supported values is
/// a registry/deployment concern, not something this crate should have
/// to know about ahead of time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub models: Vec<String>,
    #[serde(default)]
    pub request_types: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub user_tiers: Vec<String>,
}

impl Capabilities {
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    pub fn supports_request_type(&self, request_type: &str) -> bool {
        self.request_types.is_empty() || self.request_types.iter().any(|t| t == request_type)
    }

    pub fn supports_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn supports_all_features(&self, required: &[String]) -> bool {
        required.iter().all(|f| self.supports_feature(f))
    }

    pub fn supports_tier(&self, tier: &str) -> bool {
        self.user_tiers.is_empty() || self.user_tiers.iter().any(|t| t == tier)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostMetrics {
    pub cost_per_request: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub avg_latency_ms: f64,
    pub requests_per_second: f64,
    pub success_rate: f64,
    pub performance_index: f64,
}

/// The external, registry-shaped view of a provider.
///
/// This is what `Router::add_provider` consumes; the live `Provider`
/// record is derived from it plus whatever routing state accrues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub cost_metrics: CostMetrics,
    #[serde(default)]
    pub performance_metrics: PerformanceMetrics,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    100
}

/// Live routing state for a single provider.
///
/// Invariants (enforced by the crates that mutate this type, not by the
/// type itself): `health_score` stays in `[0.0, 1.0]`, `active_connections`
/// never goes negative (it's unsigned so that's structural), a draining
/// provider accepts no new requests but may still complete in-flight ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub weight: u32,
    pub capabilities: Capabilities,
    pub cost_metrics: CostMetrics,
    pub performance_metrics: PerformanceMetrics,
    pub health_score: f64,
    pub active_connections: u64,
    #[serde(skip)]
    pub last_used: Option<Timestamp>,
    #[serde(skip)]
    pub last_success_time: Option<Timestamp>,
    #[serde(skip)]
    pub last_failure_time: Option<Timestamp>,
    pub is_draining: bool,
    pub failover_target: Option<ProviderId>,
}

impl Provider {
    pub fn from_descriptor(descriptor: ProviderDescriptor) -> Self {
        Self {
            id: descriptor.id,
            weight: descriptor.weight,
            capabilities: descriptor.capabilities,
            cost_metrics: descriptor.cost_metrics,
            performance_metrics: descriptor.performance_metrics,
            health_score: 1.0,
            active_connections: 0,
            last_used: None,
            last_success_time: None,
            last_failure_time: None,
            is_draining: false,
            failover_target: None,
        }
    }

    /// Router admission threshold: a provider is routable when its
    /// health score clears this floor and it isn't draining.
    pub fn is_healthy(&self) -> bool {
        self.health_score >= 0.5 && !self.is_draining
    }

    /// Failover Manager's stricter classification.
    pub fn is_failover_healthy(&self) -> bool {
        self.health_score >= 0.7
    }

    pub fn is_failover_unhealthy(&self) -> bool {
        self.health_score < 0.5
    }

    pub fn set_health_score(&mut self, score: f64) {
        self.health_score = score.clamp(0.0, 1.0);
    }

    pub fn increment_connections(&mut self) {
        self.active_connections += 1;
    }

    pub fn decrement_connections(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            capabilities: Capabilities {
                models: vec!["gpt-4".to_string()],
                request_types: vec![],
                features: vec!["streaming".to_string()],
                user_tiers: vec![],
            },
            cost_metrics: CostMetrics::default(),
            performance_metrics: PerformanceMetrics::default(),
            weight: 100,
        }
    }

    #[test]
    fn fresh_provider_starts_fully_healthy() {
        let p = Provider::from_descriptor(descriptor("p1"));
        assert_eq!(p.health_score, 1.0);
        assert!(p.is_healthy());
        assert!(p.is_failover_healthy());
    }

    #[test]
    fn draining_provider_is_not_routable_even_if_healthy() {
        let mut p = Provider::from_descriptor(descriptor("p1"));
        p.is_draining = true;
        assert!(!p.is_healthy());
    }

    #[test]
    fn health_score_clamps_to_unit_interval() {
        let mut p = Provider::from_descriptor(descriptor("p1"));
        p.set_health_score(5.0);
        assert_eq!(p.health_score, 1.0);
        p.set_health_score(-5.0);
        assert_eq!(p.health_score, 0.0);
    }

    #[test]
    fn connection_count_never_underflows() {
        let mut p = Provider::from_descriptor(descriptor("p1"));
        p.decrement_connections();
        assert_eq!(p.active_connections, 0);
    }
}
