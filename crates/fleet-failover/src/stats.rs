use fleet_circuit::CircuitState;
use fleet_types::ProviderId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub health_score: f64,
    pub circuit_state: CircuitState,
    pub active_connections: u64,
    pub consecutive_failures: u32,
    pub is_draining: bool,
    pub failover_target: Option<ProviderId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailoverStats {
    pub total_failovers: u64,
    pub successful_failovers: u64,
    pub failed_failovers: u64,
    pub avg_failover_time_ms: f64,
}

impl FailoverStats {
    pub(crate) fn record_attempt(&mut self, succeeded: bool, elapsed_ms: f64) {
        self.total_failovers += 1;
        if succeeded {
            let prior_successes = self.successful_failovers;
            self.successful_failovers += 1;
            self.avg_failover_time_ms =
                (self.avg_failover_time_ms * prior_successes as f64 + elapsed_ms) / self.successful_failovers as f64;
        } else {
            self.failed_failovers += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailoverSnapshot {
    pub stats: FailoverStats,
    pub per_provider: HashMap<ProviderId, ProviderStatus>,
}
