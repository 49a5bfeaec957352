//! Structured logging and Prometheus metrics shared across the fleet
//! control-plane crates. Not a control-plane component itself.

mod logging;
mod metrics;

pub use logging::{init_tracing, TracingConfig};
pub use metrics::{
    CircuitMetrics, CircuitStateLabel, FailoverMetrics, MetricsInitError, MetricsRegistry, RateLimitMetrics,
    RoutingMetrics,
};
