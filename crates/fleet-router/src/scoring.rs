//! Capability-based scoring used by the default routing strategy.

use fleet_types::{Priority, Provider, RequestDescriptor};

#[derive(Debug, Clone, Copy)]
pub struct ScoringCoefficients {
    pub capability: f64,
    pub performance: f64,
    pub cost: f64,
    pub health: f64,
    pub load: f64,
    pub affinity: f64,
}

impl Default for ScoringCoefficients {
    fn default() -> Self {
        Self { capability: 0.4, performance: 0.2, cost: 0.2, health: 0.1, load: 0.05, affinity: 0.05 }
    }
}

/// First two dash-separated tokens, used for family-prefix matching
/// (e.g. "gpt-4-turbo" and "gpt-4-vision" share the "gpt-4" family).
fn family_prefix(model: &str) -> &str {
    let mut splits = model.match_indices('-');
    match splits.nth(1) {
        Some((idx, _)) => &model[..idx],
        None => model,
    }
}

fn model_match_score(required: &str, candidates: &[String]) -> f64 {
    if candidates.iter().any(|m| m == required) {
        return 100.0;
    }
    let required_family = family_prefix(required);
    if candidates.iter().any(|m| family_prefix(m) == required_family) {
        return 80.0;
    }
    if candidates.iter().any(|m| m.contains(required) || required.contains(m.as_str())) {
        return 60.0;
    }
    0.0
}

fn capability_match(provider: &Provider, request: &RequestDescriptor) -> f64 {
    if !provider.capabilities.supports_request_type(&request.request_type) {
        return 0.0;
    }
    if !provider.capabilities.supports_all_features(&request.required_features) {
        return 0.0;
    }
    if let Some(tier) = &request.user_tier {
        if !provider.capabilities.supports_tier(tier) {
            return 0.0;
        }
    }
    match &request.model {
        None => 100.0,
        Some(model) => model_match_score(model, &provider.capabilities.models),
    }
}

fn latency_band(avg_latency_ms: f64) -> f64 {
    if avg_latency_ms <= 100.0 {
        100.0
    } else if avg_latency_ms <= 500.0 {
        80.0
    } else if avg_latency_ms <= 1000.0 {
        60.0
    } else if avg_latency_ms <= 2000.0 {
        40.0
    } else if avg_latency_ms <= 5000.0 {
        20.0
    } else {
        0.0
    }
}

fn throughput_band(requests_per_second: f64) -> f64 {
    if requests_per_second >= 100.0 {
        100.0
    } else if requests_per_second >= 50.0 {
        80.0
    } else if requests_per_second >= 20.0 {
        60.0
    } else if requests_per_second >= 5.0 {
        40.0
    } else if requests_per_second >= 1.0 {
        20.0
    } else {
        0.0
    }
}

fn performance(provider: &Provider, min_performance: Option<f64>) -> f64 {
    let metrics = &provider.performance_metrics;
    let raw = (latency_band(metrics.avg_latency_ms)
        + throughput_band(metrics.requests_per_second)
        + metrics.success_rate * 100.0)
        / 3.0;
    match min_performance {
        Some(min) if raw < min => raw * 0.5,
        _ => raw,
    }
}

fn cost_band(cost_per_request: f64) -> f64 {
    if cost_per_request <= 0.001 {
        150.0
    } else if cost_per_request <= 0.005 {
        130.0
    } else if cost_per_request <= 0.01 {
        110.0
    } else if cost_per_request <= 0.02 {
        90.0
    } else if cost_per_request <= 0.05 {
        60.0
    } else if cost_per_request <= 0.1 {
        30.0
    } else {
        10.0
    }
}

fn cost(provider: &Provider, request: &RequestDescriptor) -> f64 {
    if let Some(max_cost) = request.max_cost {
        if provider.cost_metrics.cost_per_request > max_cost {
            return 0.0;
        }
    }
    let banded = cost_band(provider.cost_metrics.cost_per_request);
    (banded * request.priority.cost_multiplier()).clamp(0.0, 150.0)
}

fn load_band(active_connections: u64) -> f64 {
    if active_connections == 0 {
        100.0
    } else if active_connections <= 5 {
        80.0
    } else if active_connections <= 20 {
        60.0
    } else if active_connections <= 50 {
        40.0
    } else if active_connections <= 100 {
        20.0
    } else {
        0.0
    }
}

fn affinity(provider: &Provider, request: &RequestDescriptor) -> f64 {
    match &request.session_affinity {
        Some(target) if target == &provider.id => 500.0,
        _ => 50.0,
    }
}

/// Total capability score for `provider` against `request`. Zero if
/// either `capability_match` or `cost` is zero, regardless of the other
/// dimensions.
pub fn score(provider: &Provider, request: &RequestDescriptor, coefficients: ScoringCoefficients) -> f64 {
    let capability = capability_match(provider, request);
    let cost = cost(provider, request);
    if capability == 0.0 || cost == 0.0 {
        return 0.0;
    }

    let performance = performance(provider, request.min_performance);
    let health = provider.health_score * 100.0;
    let load = load_band(provider.active_connections);
    let affinity = affinity(provider, request);

    let total = capability * coefficients.capability
        + performance * coefficients.performance
        + cost * coefficients.cost
        + health * coefficients.health
        + load * coefficients.load
        + affinity * coefficients.affinity;

    total * (provider.weight as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{Capabilities, CostMetrics, PerformanceMetrics, ProviderDescriptor};

    fn provider(id: &str, models: &[&str]) -> Provider {
        Provider::from_descriptor(ProviderDescriptor {
            id: id.to_string(),
            capabilities: Capabilities {
                models: models.iter().map(|m| m.to_string()).collect(),
                request_types: vec!["chat".to_string()],
                features: vec![],
                user_tiers: vec!["free".to_string()],
            },
            cost_metrics: CostMetrics { cost_per_request: 0.001 },
            performance_metrics: PerformanceMetrics {
                avg_latency_ms: 80.0,
                requests_per_second: 120.0,
                success_rate: 0.99,
                performance_index: 0.9,
            },
            weight: 100,
        })
    }

    fn request(model: Option<&str>) -> RequestDescriptor {
        RequestDescriptor { model: model.map(|m| m.to_string()), ..Default::default() }
    }

    #[test]
    fn exact_model_match_scores_highest_capability_component() {
        let p = provider("p1", &["gpt-4-turbo"]);
        let r = request(Some("gpt-4-turbo"));
        assert_eq!(capability_match(&p, &r), 100.0);
    }

    #[test]
    fn family_prefix_match_scores_eighty() {
        let p = provider("p1", &["gpt-4-vision"]);
        let r = request(Some("gpt-4-turbo"));
        assert_eq!(capability_match(&p, &r), 80.0);
    }

    #[test]
    fn unsupported_model_scores_zero_capability() {
        let p = provider("p1", &["claude-3"]);
        let r = request(Some("gpt-4-turbo"));
        assert_eq!(capability_match(&p, &r), 0.0);
    }

    #[test]
    fn cost_above_max_cost_short_circuits_total_to_zero() {
        let p = provider("p1", &["gpt-4-turbo"]);
        let mut r = request(Some("gpt-4-turbo"));
        r.max_cost = Some(0.0001);
        assert_eq!(score(&p, &r, ScoringCoefficients::default()), 0.0);
    }

    #[test]
    fn higher_weight_scales_total_score_proportionally() {
        let mut p100 = provider("p1", &["gpt-4-turbo"]);
        p100.weight = 100;
        let mut p200 = provider("p2", &["gpt-4-turbo"]);
        p200.weight = 200;
        let r = request(Some("gpt-4-turbo"));
        let coeffs = ScoringCoefficients::default();
        let s100 = score(&p100, &r, coeffs);
        let s200 = score(&p200, &r, coeffs);
        assert!((s200 - 2.0 * s100).abs() < 1e-9);
    }

    #[test]
    fn priority_scales_cost_component() {
        let p = provider("p1", &["gpt-4-turbo"]);
        let mut critical = request(Some("gpt-4-turbo"));
        critical.priority = Priority::Critical;
        let mut low = request(Some("gpt-4-turbo"));
        low.priority = Priority::Low;
        let coeffs = ScoringCoefficients::default();
        assert!(score(&p, &critical, coeffs) > score(&p, &low, coeffs));
    }
}
