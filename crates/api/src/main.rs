use std::net::SocketAddr;

use anyhow::Context;

use ridelink_api::app::{build_app, Governance};
use ridelink_infra::rate_limit::spawn_sweeper;
use ridelink_infra::GovernanceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ridelink_observability::init();

    let config = GovernanceConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        window_secs = config.window_duration.as_secs(),
        max_requests = config.max_requests.get(),
        strategy = config.strategy.as_str(),
        origins = ?config.allowed_origins,
        trust_proxy_headers = config.trust_proxy_headers,
        "request governance configured"
    );

    let governance = Governance::from_config(&config);
    let sweeper = spawn_sweeper(governance.login_limiter(), config.sweep_interval);
    let app = build_app(&config, governance);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
