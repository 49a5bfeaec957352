//! Per-circuit state machine: Closed / Open / HalfOpen.

use crate::config::CircuitConfig;
use fleet_types::Timestamp;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// What an admission check decided, before the wrapped call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admit,
    RejectOpen,
    RejectHalfOpenTimeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitInfo {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Timestamp>,
    pub last_success_time: Option<Timestamp>,
    pub half_open_entered_at: Option<Timestamp>,
}

/// The mutable state for a single provider's circuit. Every method takes
/// `now` explicitly rather than reading a clock itself, so the breaker
/// can serialize all mutation for a circuit behind one lock without the
/// lock holder needing its own clock handle.
#[derive(Debug, Clone)]
pub(crate) struct Circuit {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Timestamp>,
    last_success_time: Option<Timestamp>,
    half_open_entered_at: Option<Timestamp>,
    config: CircuitConfig,
}

impl Circuit {
    pub(crate) fn new(config: CircuitConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_success_time: None,
            half_open_entered_at: None,
            config,
        }
    }

    pub(crate) fn set_config(&mut self, config: CircuitConfig) {
        self.config = config;
    }

    /// Evaluates and applies any time-based transition due at `now`
    /// (Open -> HalfOpen, HalfOpen -> Open on timeout), then decides
    /// whether to admit a request in the resulting state.
    pub(crate) fn admit(&mut self, now: Timestamp) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Admit,
            CircuitState::Open => {
                let last_failure = self.last_failure_time.unwrap_or(now);
                if now.saturating_duration_since(last_failure) >= self.config.open_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_entered_at = Some(now);
                    self.success_count = 0;
                    Admission::Admit
                } else {
                    Admission::RejectOpen
                }
            }
            CircuitState::HalfOpen => {
                let entered_at = self.half_open_entered_at.unwrap_or(now);
                if now.saturating_duration_since(entered_at) >= self.config.half_open_timeout {
                    self.state = CircuitState::Open;
                    self.last_failure_time = Some(now);
                    Admission::RejectHalfOpenTimeout
                } else {
                    Admission::Admit
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, now: Timestamp) {
        self.last_success_time = Some(now);
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = self.success_count.saturating_add(1);
            }
            CircuitState::HalfOpen => {
                self.success_count = self.success_count.saturating_add(1);
                if self.success_count >= self.config.success_threshold {
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
            CircuitState::Open => {
                // A success can only reach here via an out-of-band
                // record_success call; it doesn't change Open's admission
                // gate, only the recency term in health_score.
            }
        }
    }

    pub(crate) fn record_failure(&mut self, now: Timestamp) {
        self.last_failure_time = Some(now);
        match self.state {
            CircuitState::Closed => {
                self.failure_count = self.failure_count.saturating_add(1);
                if self.failure_count >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn force_open(&mut self, now: Timestamp) {
        self.state = CircuitState::Open;
        self.last_failure_time = Some(now);
    }

    pub(crate) fn force_close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
    }

    pub(crate) fn info(&self) -> CircuitInfo {
        CircuitInfo {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_time: self.last_failure_time,
            last_success_time: self.last_success_time,
            half_open_entered_at: self.half_open_entered_at,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// `base(state) + recency(success) - recency(failure)`, clamped to
    /// [0, 1]. Recency terms decay linearly to zero over
    /// `monitoring_window` and are zero when no event has been recorded.
    pub(crate) fn health_score(&self, now: Timestamp) -> f64 {
        let base = match self.state {
            CircuitState::Closed => 1.0,
            CircuitState::HalfOpen => 0.5,
            CircuitState::Open => 0.0,
        };
        let recency = |at: Option<Timestamp>, weight: f64| -> f64 {
            match at {
                Some(t) => {
                    let elapsed = now.saturating_duration_since(t).as_secs_f64();
                    let window = self.config.monitoring_window.as_secs_f64();
                    if window <= 0.0 {
                        return 0.0;
                    }
                    weight * (1.0 - (elapsed / window)).max(0.0)
                }
                None => 0.0,
            }
        };
        let score = base + recency(self.last_success_time, 0.5) - recency(self.last_failure_time, 0.3);
        score.clamp(0.0, 1.0)
    }
}
