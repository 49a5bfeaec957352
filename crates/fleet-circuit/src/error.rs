use thiserror::Error;

/// Admission and execution errors from `CircuitBreaker::call`.
///
/// `Inner` is a pass-through of whatever error the wrapped call produced;
/// the circuit breaker never inspects it beyond treating its presence as
/// a failure outcome.
#[derive(Error, Debug)]
pub enum CircuitCallError<E> {
    #[error("circuit is open")]
    CircuitOpen,
    #[error("circuit timed out waiting in half-open state")]
    CircuitHalfOpenTimeout,
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitCallError<E> {
    pub fn is_admission_error(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::CircuitHalfOpenTimeout)
    }
}

/// Configuration error surfaced only to the administrative API, never to
/// the request path.
#[derive(Error, Debug)]
pub enum CircuitConfigError {
    #[error("negative or zero threshold: {0}")]
    InvalidThreshold(&'static str),
}
