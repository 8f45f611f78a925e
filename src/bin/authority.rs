//! Authority binary entry point

use github_oauth_gate::{
    AuthorityState, authority_router,
    config::{AuthorityConfig, LoggingConfig},
    metrics, server,
};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AuthorityState and the expired attempt sweeper
/// 4. Build Axum router
/// 5. Serve until Ctrl+C / SIGTERM, then drain
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = match AuthorityConfig::load() {
        Ok(config) => config,
        Err(e) => {
            server::init_tracing(&LoggingConfig::default());
            tracing::error!(error = %e, "Failed to load authority configuration");
            return Err(e.into());
        }
    };

    // 2. Initialize tracing/logging
    server::init_tracing(&config.logging);
    metrics::init_metrics();
    config.log_warnings();
    tracing::info!(
        api_base_url = %config.api_base_url,
        attempt_ttl_seconds = config.attempt.ttl_seconds,
        "Configuration loaded"
    );

    let addr = config.server.bind_address();
    let drain = config.shutdown.drain();
    let cleanup_interval = config.attempt.cleanup_interval();

    // 3. Initialize state and background sweeper
    let state = AuthorityState::new(config)?;
    let sweeper = state
        .store
        .spawn_sweeper(cleanup_interval, state.events.clone());

    // 4. Build Axum router
    let app = authority_router(state);

    // 5. Start HTTP server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Authority listening on {}", addr);

    let result = server::serve(listener, app, server::shutdown_signal(), drain).await;
    sweeper.abort();
    tracing::info!("Authority stopped");

    result?;
    Ok(())
}
