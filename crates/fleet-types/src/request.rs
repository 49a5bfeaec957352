//! Request descriptor: what a caller is asking the fleet to route.

use serde::{Deserialize, Serialize};

/// Relative importance of a request; feeds the cost dimension of
/// capability scoring (Critical x1.5, High x1.2,
/// Normal x1.0, Low x0.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    pub fn cost_multiplier(&self) -> f64 {
        match self {
            Priority::Critical => 1.5,
            Priority::High => 1.2,
            Priority::Normal => 1.0,
            Priority::Low => 0.8,
        }
    }
}

fn default_request_type() -> String {
    "chat".to_string()
}

/// A single inbound inference request, as consumed from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_request_type")]
    pub request_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub max_cost: Option<f64>,
    #[serde(default)]
    pub min_performance: Option<f64>,
    #[serde(default)]
    pub required_features: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_tier: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_affinity: Option<String>,
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            model: None,
            request_type: default_request_type(),
            priority: Priority::default(),
            max_cost: None,
            min_performance: None,
            required_features: Vec::new(),
            user_id: None,
            user_tier: None,
            session_id: None,
            session_affinity: None,
            estimated_tokens: None,
        }
    }
}

impl RequestDescriptor {
    /// Hash key for the `ConsistentHash` strategy: `user_id
    /// ":" session_id`, defaulting each absent half to a literal
    /// placeholder so a request missing both still maps deterministically.
    pub fn consistent_hash_key(&self) -> String {
        let user = self.user_id.as_deref().unwrap_or("__no_user__");
        let session = self.session_id.as_deref().unwrap_or("__no_session__");
        format!("{user}:{session}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_defaults_to_normal_with_unit_multiplier() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(Priority::default().cost_multiplier(), 1.0);
    }

    #[test]
    fn hash_key_is_deterministic_when_both_halves_absent() {
        let r1 = RequestDescriptor::default();
        let r2 = RequestDescriptor::default();
        assert_eq!(r1.consistent_hash_key(), r2.consistent_hash_key());
    }

    #[test]
    fn hash_key_incorporates_user_and_session() {
        let r = RequestDescriptor {
            user_id: Some("alice".to_string()),
            session_id: Some("sess-1".to_string()),
            ..Default::default()
        };
        assert_eq!(r.consistent_hash_key(), "alice:sess-1");
    }
}
