use super::error::AdminError;
use super::AppState;
use axum::extract::{Path, State};
use axum::Json;
use fleet_circuit::CircuitInfo;
use fleet_failover::FailoverSnapshot;
use fleet_router::ProviderSnapshot;
use fleet_types::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy", version: env!("CARGO_PKG_VERSION") })
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

pub async fn providers(State(state): State<AppState>) -> Json<HashMap<ProviderId, ProviderSnapshot>> {
    Json(state.router.provider_stats())
}

pub async fn circuits(State(state): State<AppState>) -> Json<HashMap<ProviderId, CircuitInfo>> {
    let infos = state
        .router
        .provider_ids()
        .into_iter()
        .map(|id| {
            let info = state.circuit_breaker.get_info(&id);
            (id, info)
        })
        .collect();
    Json(infos)
}

pub async fn failover_stats(State(state): State<AppState>) -> Json<FailoverSnapshot> {
    Json(state.failover.stats())
}

#[derive(Debug, Deserialize, Default)]
pub struct DrainRequest {
    pub target: Option<ProviderId>,
}

pub async fn drain_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DrainRequest>,
) -> Result<Json<serde_json::Value>, AdminError> {
    if state.router.get_provider(&id).is_none() {
        return Err(AdminError::UnknownProvider(id));
    }
    info!(provider = %id, target = ?body.target, "draining provider via admin API");
    state.failover.start_drain(&id, body.target);
    Ok(Json(serde_json::json!({ "draining": id })))
}
