//! Operator-facing HTTP surface: read-only introspection over the
//! router, circuit breaker and failover manager, plus a single
//! mutating endpoint to start a drain by hand.

mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use fleet_circuit::CircuitBreaker;
use fleet_failover::FailoverManager;
use fleet_router::Router as FleetRouter;
use fleet_telemetry::MetricsRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<FleetRouter>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub failover: Arc<FailoverManager>,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/admin/providers", get(handlers::providers))
        .route("/admin/circuits", get(handlers::circuits))
        .route("/admin/failover/stats", get(handlers::failover_stats))
        .route("/admin/providers/{id}/drain", post(handlers::drain_provider))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fleet_circuit::CircuitBreaker;
    use fleet_failover::FailoverManager;
    use fleet_router::Router as FleetRouter;
    use fleet_types::ManualClock;
    use std::sync::OnceLock;
    use tower::ServiceExt;

    // The prometheus recorder is a process-wide global; install it once
    // and share the handle across every test in this module.
    static METRICS: OnceLock<Arc<MetricsRegistry>> = OnceLock::new();

    fn state() -> AppState {
        let clock: fleet_types::SharedClock = Arc::new(ManualClock::new());
        let router = Arc::new(FleetRouter::new(clock.clone()));
        let circuit_breaker = Arc::new(CircuitBreaker::new(clock.clone()));
        let failover = Arc::new(FailoverManager::new(clock, router.clone(), circuit_breaker.clone()));
        let metrics = METRICS.get_or_init(|| Arc::new(MetricsRegistry::new().expect("metrics registry"))).clone();
        AppState { router, circuit_breaker, failover, metrics }
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_app(state());
        let response =
            app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn draining_an_unknown_provider_is_not_found() {
        let app = build_app(state());
        let request = Request::builder()
            .method("POST")
            .uri("/admin/providers/ghost/drain")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
