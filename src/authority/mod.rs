//! Authority service
//!
//! Holds the GitHub OAuth credentials and the correlation store, and exposes
//! the three endpoints a gate drives a login through:
//!
//! - `POST /oauth/page-url` - store an attempt, return the provider URL
//! - `GET /oauth/redirect` - provider callback, exchange code for identity
//! - `GET /oauth/result` - hand the identity to the gate, consume the attempt

pub mod middleware;
mod oauth;
pub mod provider;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::AuthorityConfig;
use crate::error::AppError;
use crate::events::{FlowEvent, SharedEventSink, TracingEventSink};
use crate::model::{HEALTH_PATH, OAUTH_PATH, PAGE_URL_PATH, REDIRECT_PATH, RESULT_PATH};

pub use provider::{GithubProvider, IdentityProvider, ProviderError};
pub use store::{CorrelationStore, PendingAuthAttempt};

/// Largest request body the authority accepts.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Authority state shared across all handlers
#[derive(Clone)]
pub struct AuthorityState {
    /// Service configuration
    pub config: Arc<AuthorityConfig>,
    /// Pending login attempts
    pub store: CorrelationStore,
    /// Identity provider client
    pub provider: Arc<dyn IdentityProvider>,
    /// Flow event receiver
    pub events: SharedEventSink,
}

impl AuthorityState {
    /// Build state with the GitHub provider and the tracing event sink.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: AuthorityConfig) -> Result<Self, AppError> {
        let provider = GithubProvider::new(&config.github, config.http.timeout())
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self::with_parts(
            config,
            Arc::new(provider),
            Arc::new(TracingEventSink),
        ))
    }

    /// Build state from explicit collaborators.
    pub fn with_parts(
        config: AuthorityConfig,
        provider: Arc<dyn IdentityProvider>,
        events: SharedEventSink,
    ) -> Self {
        let store = CorrelationStore::new(config.attempt.ttl());
        Self {
            config: Arc::new(config),
            store,
            provider,
            events,
        }
    }
}

/// Build the authority router.
///
/// Shared by the binary and integration tests to keep route composition
/// consistent across environments.
pub fn authority_router(state: AuthorityState) -> Router {
    let gate_facing = Router::new()
        .route(PAGE_URL_PATH, post(oauth::page_url))
        .route(RESULT_PATH, get(oauth::result))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_secret,
        ));

    let oauth_routes = Router::new()
        .merge(gate_facing)
        .route(REDIRECT_PATH, get(oauth::redirect))
        .layer(axum_middleware::from_fn(middleware::no_cache))
        .route(HEALTH_PATH, get(oauth::health_check));

    state.events.emit(FlowEvent::RoutesMounted {
        component: "authority",
        routes: vec![
            "GET /",
            "POST /oauth/page-url",
            "GET /oauth/redirect",
            "GET /oauth/result",
            "GET /oauth/health",
            "GET /metrics",
        ],
    });

    Router::new()
        .route("/", get(oauth::banner))
        .nest(OAUTH_PATH, oauth_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        )
        .route("/metrics", get(crate::server::metrics_handler))
        .with_state(state)
}
