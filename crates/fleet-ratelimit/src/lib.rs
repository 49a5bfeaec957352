mod bucket;
mod config;
mod limiter;

pub use bucket::{Bucket, BucketKey, Resource, Scope};
pub use config::{RateLimitConfig, SessionLimit, WindowLimit, DEFAULT_SESSION_LIMIT, FALLBACK_LIMIT};
pub use limiter::{
    AdmissionDecision, AdmissionRequest, DenyingScope, RateLimiter, RateStatus, UsageRecord,
};
