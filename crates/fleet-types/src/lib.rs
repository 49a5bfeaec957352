//! Shared domain types for the LLM fleet control plane
//!
//! Every control-plane crate (`fleet-ring`, `fleet-ratelimit`,
//! `fleet-circuit`, `fleet-router`, `fleet-failover`) depends on this
//! crate for the provider/request value types and the injectable `Clock`
//! abstraction, instead of each defining its own copy.

pub mod clock;
pub mod provider;
pub mod request;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock, Timestamp};
pub use provider::{Capabilities, CostMetrics, PerformanceMetrics, Provider, ProviderDescriptor, ProviderId};
pub use request::{Priority, RequestDescriptor};
