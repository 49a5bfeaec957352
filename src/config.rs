//! Process-wide configuration, assembled from defaults, an optional
//! `fleet.toml`, and `FLEET_`-prefixed environment variables.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use fleet_circuit::CircuitConfig;
use fleet_failover::{FailoverConfig, FailoverStrategy, RedistributionMode};
use fleet_router::StrategyKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:8080".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub json_logs: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { json_logs: false }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_secs: u64,
    pub half_open_timeout_secs: u64,
    pub monitoring_window_secs: u64,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        let d = CircuitConfig::default();
        Self {
            failure_threshold: d.failure_threshold,
            success_threshold: d.success_threshold,
            open_timeout_secs: d.open_timeout.as_secs(),
            half_open_timeout_secs: d.half_open_timeout.as_secs(),
            monitoring_window_secs: d.monitoring_window.as_secs(),
        }
    }
}

impl CircuitSettings {
    pub fn to_circuit_config(self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_timeout: Duration::from_secs(self.open_timeout_secs),
            half_open_timeout: Duration::from_secs(self.half_open_timeout_secs),
            monitoring_window: Duration::from_secs(self.monitoring_window_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverSettings {
    pub strategy: FailoverStrategy,
    pub health_check_interval_secs: u64,
    pub min_healthy_providers: u32,
    pub redistribution_mode: RedistributionMode,
    pub drain_timeout_secs: u64,
    pub recovery_verification_count: u32,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        let d = FailoverConfig::default();
        Self {
            strategy: d.strategy,
            health_check_interval_secs: d.health_check_interval.as_secs(),
            min_healthy_providers: d.min_healthy_providers,
            redistribution_mode: d.redistribution_mode,
            drain_timeout_secs: d.drain_timeout.as_secs(),
            recovery_verification_count: d.recovery_verification_count,
        }
    }
}

impl FailoverSettings {
    pub fn to_failover_config(self) -> FailoverConfig {
        FailoverConfig {
            strategy: self.strategy,
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            min_healthy_providers: self.min_healthy_providers,
            redistribution_mode: self.redistribution_mode,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            recovery_verification_count: self.recovery_verification_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerSettings,
    pub observability: ObservabilitySettings,
    pub routing_strategy: StrategyKind,
    pub circuit: CircuitSettings,
    pub failover: FailoverSettings,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            observability: ObservabilitySettings::default(),
            routing_strategy: StrategyKind::default(),
            circuit: CircuitSettings::default(),
            failover: FailoverSettings::default(),
        }
    }
}

impl FleetConfig {
    /// Layers, lowest precedence first: compiled-in defaults, then
    /// `fleet.toml` in the working directory if present, then
    /// `FLEET_`-prefixed environment variables (e.g.
    /// `FLEET_SERVER.BIND_ADDR`, `FLEET_CIRCUIT.FAILURE_THRESHOLD`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(FleetConfig::default()))
            .merge(Toml::file("fleet.toml"))
            .merge(Env::prefixed("FLEET_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_figment() {
        std::env::remove_var("FLEET_SERVER__BIND_ADDR");
        let config = Figment::new().merge(Serialized::defaults(FleetConfig::default())).extract::<FleetConfig>().unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.circuit.failure_threshold, 5);
    }

    #[test]
    fn env_override_takes_precedence_over_defaults() {
        std::env::set_var("FLEET_SERVER__BIND_ADDR", "127.0.0.1:9090");
        let config = Figment::new()
            .merge(Serialized::defaults(FleetConfig::default()))
            .merge(Env::prefixed("FLEET_").split("__"))
            .extract::<FleetConfig>()
            .unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9090");
        std::env::remove_var("FLEET_SERVER__BIND_ADDR");
    }
}
