mod error;
mod router;
mod scoring;
mod strategy;

pub use error::RouterError;
pub use router::{ProviderSnapshot, Router};
pub use scoring::ScoringCoefficients;
pub use strategy::StrategyKind;
