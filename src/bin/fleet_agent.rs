//! Fleet control-plane agent: wires the ring, rate limiter, circuit
//! breaker, router and failover manager together behind an admin HTTP
//! surface, and drives the periodic failover sweep.

use fleet_agent::config::FleetConfig;
use fleet_agent::{build_app, AppState};
use fleet_circuit::CircuitBreaker;
use fleet_failover::FailoverManager;
use fleet_router::Router;
use fleet_telemetry::{init_tracing, MetricsRegistry, TracingConfig};
use fleet_types::system_clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FleetConfig::load()?;

    init_tracing(TracingConfig { json_logs: config.observability.json_logs, ..TracingConfig::default() })
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting fleet agent");

    let metrics = Arc::new(MetricsRegistry::new()?);
    let clock = system_clock();

    let router = Arc::new(Router::with_strategy(clock.clone(), config.routing_strategy));
    let circuit_breaker = Arc::new(CircuitBreaker::with_config(clock.clone(), config.circuit.to_circuit_config()));
    let failover = Arc::new(FailoverManager::with_config(
        clock,
        router.clone(),
        circuit_breaker.clone(),
        config.failover.clone().to_failover_config(),
    ));

    let sweep_interval = Duration::from_secs(config.failover.health_check_interval_secs.max(1));
    let sweep_handle = failover.clone().run(sweep_interval);

    let app_state = AppState { router, circuit_breaker, failover, metrics };
    let app = build_app(app_state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr.as_str()).await?;
    info!(addr = %config.server.bind_addr, "admin surface listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    sweep_handle.abort();
    info!("fleet agent shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c"),
        _ = terminate => info!("received terminate signal"),
    }

    info!("initiating graceful shutdown");
}
