//! Gate
//!
//! Reverse proxy in front of one origin. Decides per request whether the
//! caller holds a valid session for a whitelisted GitHub identity, and runs
//! the login redirect dance with the authority when it does not.

pub mod client;
mod handler;
pub mod proxy;
pub mod session;
pub mod whitelist;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::GateConfig;
use crate::error::AppError;
use crate::events::{FlowEvent, SharedEventSink, TracingEventSink};

pub use client::{AuthorityClient, AuthorityClientError};
pub use proxy::OriginClient;
pub use session::{SessionError, SessionKey};
pub use whitelist::WhitelistPolicy;

/// Gate state shared across all requests
#[derive(Clone)]
pub struct GateState {
    /// Gate configuration
    pub config: Arc<GateConfig>,
    /// Session signing key
    pub key: SessionKey,
    /// Authorization policy
    pub whitelist: Arc<WhitelistPolicy>,
    /// Authority client
    pub authority: AuthorityClient,
    /// Protected origin
    pub origin: OriginClient,
    /// Flow event receiver
    pub events: SharedEventSink,
}

impl GateState {
    /// Build state with the configured (or generated) session key and the
    /// tracing event sink.
    ///
    /// # Errors
    /// Returns error if an HTTP client cannot be built or `origin_url` is invalid
    pub fn new(config: GateConfig) -> Result<Self, AppError> {
        let key = SessionKey::from_config(config.jwt_secret_key.as_deref());
        Self::with_parts(config, key, Arc::new(TracingEventSink))
    }

    /// Build state from explicit collaborators.
    pub fn with_parts(
        config: GateConfig,
        key: SessionKey,
        events: SharedEventSink,
    ) -> Result<Self, AppError> {
        let authority = AuthorityClient::new(
            config.api_base_url.clone(),
            config.api_secret_key.clone(),
            config.http.timeout(),
        )
        .map_err(|e| AppError::Internal(e.into()))?;
        let origin = OriginClient::new(&config.origin_url, config.http.timeout())?;
        let whitelist = WhitelistPolicy::from(&config.whitelist);

        Ok(Self {
            config: Arc::new(config),
            key,
            whitelist: Arc::new(whitelist),
            authority,
            origin,
            events,
        })
    }

    /// Session token lifetime.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.session.ttl_seconds)
    }
}

/// Build the gate router.
///
/// Every method and path goes through one handler; the callback path is
/// matched against configuration at request time.
pub fn gate_router(state: GateState) -> Router {
    state.events.emit(FlowEvent::RoutesMounted {
        component: "gate",
        routes: vec!["ANY /*"],
    });
    tracing::info!(auth_path = %state.config.auth_path, "Gate callback path");

    Router::new()
        .fallback(handler::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
