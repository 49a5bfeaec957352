use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategy {
    Immediate,
    Graceful,
    CircuitBreakerGuided,
}

impl Default for FailoverStrategy {
    fn default() -> Self {
        FailoverStrategy::CircuitBreakerGuided
    }
}

/// How `rebalance` should be triggered on membership change. Only
/// `Rebalance` is wired to anything today; `Manual` exists so an
/// operator can turn off the automatic trigger without removing the
/// config knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionMode {
    Rebalance,
    Manual,
}

impl Default for RedistributionMode {
    fn default() -> Self {
        RedistributionMode::Rebalance
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FailoverConfig {
    pub strategy: FailoverStrategy,
    pub health_check_interval: Duration,
    pub min_healthy_providers: u32,
    pub redistribution_mode: RedistributionMode,
    pub drain_timeout: Duration,
    pub recovery_verification_count: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            strategy: FailoverStrategy::default(),
            health_check_interval: Duration::from_secs(30),
            min_healthy_providers: 1,
            redistribution_mode: RedistributionMode::default(),
            drain_timeout: Duration::from_secs(60),
            recovery_verification_count: 3,
        }
    }
}
