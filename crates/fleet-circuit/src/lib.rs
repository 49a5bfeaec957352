mod breaker;
mod config;
mod error;
mod guard;
mod state;

pub use breaker::CircuitBreaker;
pub use config::CircuitConfig;
pub use error::{CircuitCallError, CircuitConfigError};
pub use guard::CircuitBreakerGuard;
pub use state::{CircuitInfo, CircuitState};
