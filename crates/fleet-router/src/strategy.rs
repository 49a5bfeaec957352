//! Provider selection strategies.

use crate::scoring::{self, ScoringCoefficients};
use fleet_ring::HashRing;
use fleet_types::{Provider, ProviderId, RequestDescriptor};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RoundRobin,
    Weighted,
    LeastConnections,
    ConsistentHash,
    CapabilityBased,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::CapabilityBased
    }
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::Weighted => "weighted",
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::ConsistentHash => "consistent_hash",
            StrategyKind::CapabilityBased => "capability_based",
        }
    }
}

/// Deterministic iteration order for strategies whose tie-break is "by
/// id": sorted ascending.
fn sorted_by_id<'a>(candidates: &[&'a Provider]) -> Vec<&'a Provider> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
}

pub struct RoundRobinStrategy {
    index: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self { index: AtomicUsize::new(0) }
    }

    pub fn select(&self, candidates: &[&Provider]) -> Option<ProviderId> {
        if candidates.is_empty() {
            return None;
        }
        let ordered = sorted_by_id(candidates);
        let i = self.index.fetch_add(1, Ordering::Relaxed) % ordered.len();
        Some(ordered[i].id.clone())
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WeightedStrategy {
    rng: Mutex<StdRng>,
}

impl WeightedStrategy {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Picks proportionally to `weight * health_score`, truncated to an
    /// integer so the distribution is reproducible given a seed. Falls
    /// back to the first candidate by id if every weight truncates to
    /// zero.
    pub fn select(&self, candidates: &[&Provider]) -> Option<ProviderId> {
        if candidates.is_empty() {
            return None;
        }
        let ordered = sorted_by_id(candidates);
        let weights: Vec<u64> = ordered
            .iter()
            .map(|p| (p.weight as f64 * p.health_score) as u64)
            .collect();
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return Some(ordered[0].id.clone());
        }

        let draw = self.rng.lock().gen_range(0..total);
        let mut cumulative = 0u64;
        for (provider, weight) in ordered.iter().zip(weights.iter()) {
            cumulative += weight;
            if draw < cumulative {
                return Some(provider.id.clone());
            }
        }
        ordered.last().map(|p| p.id.clone())
    }
}

pub struct LeastConnectionsStrategy;

impl LeastConnectionsStrategy {
    pub fn select(&self, candidates: &[&Provider]) -> Option<ProviderId> {
        candidates
            .iter()
            .min_by_key(|p| (p.active_connections, p.id.clone()))
            .map(|p| p.id.clone())
    }
}

pub struct ConsistentHashStrategy;

impl ConsistentHashStrategy {
    /// Looks up the request's hash key in `ring`; if the owning provider
    /// isn't currently among `candidates` (unhealthy, draining, or
    /// removed), falls back to the weighted strategy.
    pub fn select(
        &self,
        candidates: &[&Provider],
        request: &RequestDescriptor,
        ring: &HashRing,
        fallback: &WeightedStrategy,
    ) -> Option<ProviderId> {
        let key = request.consistent_hash_key();
        match ring.lookup(&key) {
            Some(id) if candidates.iter().any(|p| p.id == id) => Some(id),
            _ => {
                debug!("consistent-hash target unhealthy or absent, falling back to weighted");
                fallback.select(candidates)
            }
        }
    }
}

pub struct CapabilityBasedStrategy {
    pub coefficients: ScoringCoefficients,
}

impl Default for CapabilityBasedStrategy {
    fn default() -> Self {
        Self { coefficients: ScoringCoefficients::default() }
    }
}

impl CapabilityBasedStrategy {
    /// Scores every candidate; returns the max, breaking ties by smaller
    /// `active_connections` and then by id for full determinism.
    pub fn select(&self, candidates: &[&Provider], request: &RequestDescriptor) -> Option<ProviderId> {
        candidates
            .iter()
            .map(|p| (scoring::score(p, request, self.coefficients), p))
            .max_by(|(score_a, a), (score_b, b)| {
                // A smaller active_connections (and, failing that, a
                // smaller id) must compare as Greater to win the max.
                score_a
                    .partial_cmp(score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.active_connections.cmp(&b.active_connections).reverse())
                    .then_with(|| a.id.cmp(&b.id).reverse())
            })
            .filter(|(score, _)| *score > 0.0)
            .map(|(_, p)| p.id.clone())
    }
}
