//! Consistent-hash ring with virtual nodes
//!
//! Provides a stable key -> provider mapping that degrades gracefully
//! under membership change, used by the router's `ConsistentHash`
//! strategy and by the failover manager when selecting replica targets.

pub mod hash;
pub mod ring;

pub use hash::HashAlgorithm;
pub use ring::{HashRing, RingStats, DEFAULT_VIRTUAL_NODES};
