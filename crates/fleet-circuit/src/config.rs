//! Default circuit-breaker timing and threshold configuration.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout: Duration,
    pub half_open_timeout: Duration,
    pub monitoring_window: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(60),
            half_open_timeout: Duration::from_secs(30),
            monitoring_window: Duration::from_secs(300),
        }
    }
}
