//! Prometheus metrics for the fleet control plane: routing decisions,
//! circuit transitions, rate-limit admissions and failover events.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MetricsInitError {
    #[error("failed to install prometheus recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, MetricsInitError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Self::register_descriptions();
        info!("metrics registry initialized");
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    fn register_descriptions() {
        describe_counter!("fleet_routing_decisions_total", Unit::Count, "Requests routed, by strategy and provider");
        describe_counter!("fleet_routing_rejections_total", Unit::Count, "Requests that found no available provider");
        describe_histogram!("fleet_routing_duration_seconds", Unit::Seconds, "Time spent selecting a provider");

        describe_gauge!("fleet_circuit_state", Unit::Count, "Circuit state per provider (0=closed, 1=half-open, 2=open)");
        describe_gauge!("fleet_circuit_health_score", Unit::Count, "Computed health score per provider");
        describe_counter!("fleet_circuit_failures_total", Unit::Count, "Failures recorded per provider");
        describe_counter!("fleet_circuit_successes_total", Unit::Count, "Successes recorded per provider");

        describe_counter!("fleet_rate_limit_admissions_total", Unit::Count, "Admission checks allowed, by provider");
        describe_counter!("fleet_rate_limit_denials_total", Unit::Count, "Admission checks denied, by denying scope");

        describe_counter!("fleet_failovers_total", Unit::Count, "Failover attempts, by outcome");
        describe_gauge!("fleet_healthy_providers", Unit::Count, "Providers currently classified as healthy");
    }
}

pub struct RoutingMetrics;

impl RoutingMetrics {
    pub fn record_decision(strategy: &str, provider: &str, duration: Duration) {
        counter!("fleet_routing_decisions_total", "strategy" => strategy.to_string(), "provider" => provider.to_string())
            .increment(1);
        histogram!("fleet_routing_duration_seconds", "strategy" => strategy.to_string()).record(duration.as_secs_f64());
    }

    pub fn record_rejection(strategy: &str) {
        counter!("fleet_routing_rejections_total", "strategy" => strategy.to_string()).increment(1);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CircuitStateLabel {
    Closed,
    HalfOpen,
    Open,
}

pub struct CircuitMetrics;

impl CircuitMetrics {
    pub fn update_state(provider: &str, state: CircuitStateLabel) {
        let value = match state {
            CircuitStateLabel::Closed => 0.0,
            CircuitStateLabel::HalfOpen => 1.0,
            CircuitStateLabel::Open => 2.0,
        };
        gauge!("fleet_circuit_state", "provider" => provider.to_string()).set(value);
    }

    pub fn update_health_score(provider: &str, score: f64) {
        gauge!("fleet_circuit_health_score", "provider" => provider.to_string()).set(score);
    }

    pub fn record_failure(provider: &str) {
        counter!("fleet_circuit_failures_total", "provider" => provider.to_string()).increment(1);
    }

    pub fn record_success(provider: &str) {
        counter!("fleet_circuit_successes_total", "provider" => provider.to_string()).increment(1);
    }
}

pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_admission(provider: &str) {
        counter!("fleet_rate_limit_admissions_total", "provider" => provider.to_string()).increment(1);
    }

    pub fn record_denial(denying_scope: &str) {
        counter!("fleet_rate_limit_denials_total", "scope" => denying_scope.to_string()).increment(1);
    }
}

pub struct FailoverMetrics;

impl FailoverMetrics {
    pub fn record_attempt(succeeded: bool) {
        let outcome = if succeeded { "success" } else { "failure" };
        counter!("fleet_failovers_total", "outcome" => outcome).increment(1);
    }

    pub fn update_healthy_providers(count: u64) {
        gauge!("fleet_healthy_providers").set(count as f64);
    }
}
