//! Authority middleware
//!
//! - shared API secret check for gate-facing endpoints
//! - cache-prevention headers for every response that carries attempt state

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::AuthorityState;
use crate::error::AppError;
use crate::model::authorization_value;

/// Compare the presented header with the expected one in constant time.
///
/// Both sides are hashed first so the comparison length does not depend on
/// the caller's input.
fn secret_matches(headers: &HeaderMap, secret: &str) -> bool {
    let Some(presented) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(authorization_value(secret).as_bytes());
    presented.ct_eq(&expected).into()
}

/// Middleware to require the shared API secret
///
/// An empty configured secret disables the check.
pub async fn require_api_secret(
    State(state): State<AuthorityState>,
    request: Request,
    next: Next,
) -> Response {
    let secret = state.config.api_secret_key.as_str();
    if !secret.is_empty() && !secret_matches(request.headers(), secret) {
        return AppError::InvalidApiSecret.into_response();
    }

    next.run(request).await
}

/// Middleware that marks every response as non-cacheable.
pub async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    response
}
