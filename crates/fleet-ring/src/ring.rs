//! Consistent-hash ring with virtual nodes.

use crate::hash::HashAlgorithm;
use fleet_types::ProviderId;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Virtual nodes per provider unless the caller overrides it.
pub const DEFAULT_VIRTUAL_NODES: u32 = 150;

#[derive(Debug, Clone)]
pub struct RingStats {
    pub node_count: usize,
    pub vnode_count: usize,
    pub per_node_vnodes: HashMap<ProviderId, usize>,
    pub load_factor: f64,
}

/// Maps a 2^64 hash space to provider ids via `virtual_nodes` virtual
/// positions per provider.
///
/// Invariants maintained by `add`/`remove`:
/// - each member provider owns exactly `virtual_nodes` distinct positions,
///   minus any that were rejected at insert time for colliding with
///   another provider's position (see `add`);
/// - removing a provider removes exactly those positions and leaves every
///   other provider's positions untouched;
/// - adding an already-present provider is a no-op.
#[derive(Debug, Clone)]
pub struct HashRing {
    virtual_nodes: u32,
    hash_algorithm: HashAlgorithm,
    ring: BTreeMap<u64, ProviderId>,
    positions_by_provider: HashMap<ProviderId, Vec<u64>>,
}

impl HashRing {
    pub fn new(virtual_nodes: u32, hash_algorithm: HashAlgorithm) -> Self {
        Self {
            virtual_nodes,
            hash_algorithm,
            ring: BTreeMap::new(),
            positions_by_provider: HashMap::new(),
        }
    }

    /// Adds a provider. If `id` is already present, this is a no-op.
    /// Returns `true` if the provider was newly inserted.
    pub fn add(&mut self, id: &ProviderId) -> bool {
        if self.positions_by_provider.contains_key(id) {
            return false;
        }

        let mut positions = Vec::with_capacity(self.virtual_nodes as usize);
        for i in 0..self.virtual_nodes {
            let vnode_key = format!("{id}:{i}");
            let pos = self.hash_algorithm.hash_u64(vnode_key.as_bytes());

            if self.ring.contains_key(&pos) {
                // Vanishingly rare for a real hash function; reject rather
                // than silently overwrite another provider's virtual node.
                warn!(provider = %id, vnode = i, position = pos, "ring position collision, rejecting virtual node");
                continue;
            }

            self.ring.insert(pos, id.clone());
            positions.push(pos);
        }

        self.positions_by_provider.insert(id.clone(), positions);
        true
    }

    /// Inverse of `add`. Returns `true` if the provider was present.
    pub fn remove(&mut self, id: &ProviderId) -> bool {
        match self.positions_by_provider.remove(id) {
            Some(positions) => {
                for pos in positions {
                    self.ring.remove(&pos);
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.positions_by_provider.contains_key(id)
    }

    /// Returns the provider owning the smallest position `>= hash(key)`,
    /// wrapping to the ring's minimum position if none exists. `None` if
    /// the ring has no members.
    pub fn lookup(&self, key: &str) -> Option<ProviderId> {
        if self.ring.is_empty() {
            return None;
        }
        let h = self.hash_algorithm.hash_u64(key.as_bytes());
        self.ring
            .range(h..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, id)| id.clone())
    }

    /// Walks clockwise from `hash(key)`, returning up to `n` *distinct*
    /// provider ids in the order encountered.
    pub fn lookup_n(&self, key: &str, n: usize) -> Vec<ProviderId> {
        if self.ring.is_empty() || n == 0 {
            return Vec::new();
        }
        let h = self.hash_algorithm.hash_u64(key.as_bytes());
        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(n);

        for (_, id) in self.ring.range(h..).chain(self.ring.iter()) {
            if seen.insert(id.clone()) {
                result.push(id.clone());
                if result.len() == n {
                    break;
                }
            }
        }
        result
    }

    pub fn stats(&self) -> RingStats {
        let per_node_vnodes: HashMap<ProviderId, usize> = self
            .positions_by_provider
            .iter()
            .map(|(id, positions)| (id.clone(), positions.len()))
            .collect();

        let node_count = per_node_vnodes.len();
        let vnode_count: usize = per_node_vnodes.values().sum();

        let load_factor = if node_count == 0 {
            0.0
        } else {
            let mean = vnode_count as f64 / node_count as f64;
            if mean == 0.0 {
                0.0
            } else {
                let variance = per_node_vnodes
                    .values()
                    .map(|&v| {
                        let d = v as f64 - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / node_count as f64;
                variance.sqrt() / mean
            }
        };

        RingStats { node_count, vnode_count, per_node_vnodes, load_factor }
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_lookup_returns_none() {
        let ring = HashRing::default();
        assert_eq!(ring.lookup("anything"), None);
        assert!(ring.lookup_n("anything", 3).is_empty());
    }

    #[test]
    fn add_is_idempotent() {
        let mut r1 = HashRing::new(16, HashAlgorithm::Sha256);
        r1.add(&"p1".to_string());
        let snapshot_after_first = r1.clone();

        let added_again = r1.add(&"p1".to_string());
        assert!(!added_again);
        assert_eq!(r1.stats().vnode_count, snapshot_after_first.stats().vnode_count);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut ring = HashRing::new(16, HashAlgorithm::Sha256);
        ring.add(&"p1".to_string());
        assert!(ring.remove(&"p1".to_string()));
        assert!(!ring.remove(&"p1".to_string()));
    }

    #[test]
    fn remove_after_add_restores_empty_ring() {
        let mut ring = HashRing::new(16, HashAlgorithm::Sha256);
        ring.add(&"p1".to_string());
        ring.remove(&"p1".to_string());
        let stats = ring.stats();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.vnode_count, 0);
    }

    #[test]
    fn removing_one_provider_leaves_others_untouched() {
        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES as u32, HashAlgorithm::Sha256);
        ring.add(&"a".to_string());
        ring.add(&"b".to_string());
        let b_positions_before = ring.positions_by_provider.get("b").cloned();

        ring.remove(&"a".to_string());

        assert!(!ring.contains(&"a".to_string()));
        assert!(ring.contains(&"b".to_string()));
        assert_eq!(ring.positions_by_provider.get("b").cloned(), b_positions_before);
    }

    #[test]
    fn lookup_n_returns_distinct_ids_only() {
        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::Sha256);
        for id in ["a", "b", "c", "d", "e"] {
            ring.add(&id.to_string());
        }
        let replicas = ring.lookup_n("some-request-key", 5);
        let unique: HashSet<_> = replicas.iter().cloned().collect();
        assert_eq!(replicas.len(), unique.len());
        assert_eq!(replicas.len(), 5);
    }

    #[test]
    fn lookup_n_caps_at_member_count() {
        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::Sha256);
        ring.add(&"only-one".to_string());
        let replicas = ring.lookup_n("key", 10);
        assert_eq!(replicas, vec!["only-one".to_string()]);
    }

    /// Ring with V=150, providers {a,b,c},
    /// SHA-256. Adding "d" must remap roughly 1/4 of keys (within
    /// [0.20, 0.30] over 10,000 samples), per the standard consistent
    /// hashing redistribution bound of |new|/|total|.
    #[test]
    fn adding_a_member_remaps_roughly_one_over_n_of_keys() {
        let mut before = HashRing::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::Sha256);
        for id in ["a", "b", "c"] {
            before.add(&id.to_string());
        }
        let mut after = before.clone();
        after.add(&"d".to_string());

        let sample_count = 10_000;
        let mut changed = 0usize;
        for i in 0..sample_count {
            let key = format!("fuzz-key-{i}");
            let before_owner = before.lookup(&key);
            let after_owner = after.lookup(&key);
            if before_owner != after_owner {
                changed += 1;
            }
        }

        let fraction = changed as f64 / sample_count as f64;
        assert!(
            (0.20..=0.30).contains(&fraction),
            "expected remap fraction in [0.20, 0.30], got {fraction}"
        );
    }

    /// General ring-stability property: for any two membership sets
    /// S1 subset S2, the remap fraction is bounded by roughly
    /// |S2-S1|/|S2|, with a small epsilon for virtual-node noise.
    #[test]
    fn ring_stability_bound_holds_for_growing_membership() {
        let members = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let sample_count = 10_000;
        let keys: Vec<String> = (0..sample_count).map(|i| format!("stability-key-{i}")).collect();

        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES, HashAlgorithm::Sha256);
        for &m in &members[..2] {
            ring.add(&m.to_string());
        }

        for target_len in 3..=members.len() {
            let before_owners: Vec<_> = keys.iter().map(|k| ring.lookup(k)).collect();
            ring.add(&members[target_len - 1].to_string());
            let after_owners: Vec<_> = keys.iter().map(|k| ring.lookup(k)).collect();

            let changed = before_owners
                .iter()
                .zip(after_owners.iter())
                .filter(|(b, a)| b != a)
                .count();
            let fraction = changed as f64 / sample_count as f64;

            let expected_upper = 1.0 / target_len as f64 + 0.05;
            assert!(
                fraction <= expected_upper,
                "growing to {target_len} members remapped {fraction}, expected <= {expected_upper}"
            );
        }
    }
}
