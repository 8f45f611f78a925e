//! Gate binary entry point

use github_oauth_gate::{
    GateState,
    config::{GateConfig, LoggingConfig},
    gate_router, metrics, server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match GateConfig::load() {
        Ok(config) => config,
        Err(e) => {
            server::init_tracing(&LoggingConfig::default());
            tracing::error!(error = %e, "Failed to load gate configuration");
            return Err(e.into());
        }
    };

    server::init_tracing(&config.logging);
    metrics::init_metrics();
    config.log_warnings();
    tracing::info!(
        origin_url = %config.origin_url,
        api_base_url = %config.api_base_url,
        "Configuration loaded"
    );

    let addr = config.server.bind_address();
    let drain = config.shutdown.drain();

    let metrics_task = if config.metrics.enabled {
        let metrics_addr = config.metrics.bind_address();
        let listener = tokio::net::TcpListener::bind(&metrics_addr).await?;
        tracing::info!("Gate metrics listening on {}", metrics_addr);
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, server::metrics_router()).await {
                tracing::error!(error = %e, "Metrics listener failed");
            }
        }))
    } else {
        None
    };

    let state = GateState::new(config)?;
    let app = gate_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gate listening on {}", addr);

    server::serve(listener, app, server::shutdown_signal(), drain).await?;
    if let Some(task) = metrics_task {
        task.abort();
    }
    tracing::info!("Gate stopped");

    Ok(())
}
