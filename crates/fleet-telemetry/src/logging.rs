//! `tracing` subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    pub json_logs: bool,
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "fleet-agent".to_string(),
            json_logs: false,
            env_filter: std::env::var("RUST_LOG").ok(),
        }
    }
}

/// Installs a global subscriber. Safe to call once per process; a
/// second call returns an error rather than panicking.
pub fn init_tracing(config: TracingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = config
        .env_filter
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info,fleet_agent=debug,fleet_router=debug,fleet_circuit=debug"));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_reads_service_name() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "fleet-agent");
        assert!(!config.json_logs);
    }
}
