//! Gate request handling
//!
//! Every inbound request lands here. Requests on the configured callback
//! path finish a login; everything else needs a valid session cookie and a
//! whitelisted identity before it reaches the origin.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::GateState;
use super::session::{issue_session_token, verify_session_token};
use crate::error::AppError;
use crate::events::FlowEvent;
use crate::model::{Identity, QUERY_KEY_RID, SESSION_COOKIE_NAME};
use crate::server::found;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Entry point for every gate request.
pub async fn handle(State(state): State<GateState>, jar: CookieJar, request: Request) -> Response {
    let result = if request.uri().path() == state.config.auth_path {
        callback(&state, jar, request.uri()).await
    } else {
        guarded(&state, &jar, request).await
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// First value of a possibly comma-separated header.
fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Scheme and host the browser used to reach the gate.
fn request_origin(headers: &HeaderMap, default_scheme: &str) -> Option<(String, String)> {
    let scheme = first_header_value(headers, X_FORWARDED_PROTO)
        .map(str::to_ascii_lowercase)
        .filter(|scheme| scheme == "http" || scheme == "https")
        .unwrap_or_else(|| default_scheme.to_string());

    let host = first_header_value(headers, X_FORWARDED_HOST)
        .or_else(|| first_header_value(headers, header::HOST.as_str()))?;

    Some((scheme, host.to_string()))
}

fn query_value(uri: &Uri, key: &str) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Callback phase: claim the login result, mint a session, send the browser
/// back to where it started.
async fn callback(state: &GateState, jar: CookieJar, uri: &Uri) -> Result<Response, AppError> {
    let fail = |reason: String| {
        state.events.emit(FlowEvent::CallbackFailed {
            reason: reason.clone(),
        });
        AppError::Internal(anyhow::anyhow!(reason))
    };

    let rid = query_value(uri, QUERY_KEY_RID)
        .filter(|rid| !rid.is_empty())
        .ok_or_else(|| fail("callback without rid".to_string()))?;

    let result = state
        .authority
        .fetch_auth_result(&rid)
        .await
        .map_err(|e| fail(e.to_string()))?;

    let identity = Identity::new(result.github_user_id, result.github_user_login);
    let token = issue_session_token(&identity, &state.key, state.session_ttl())
        .map_err(|e| fail(e.to_string()))?;

    state.events.emit(FlowEvent::SessionIssued {
        login: identity.login,
    });

    let cookie = session_cookie(token, state.config.session.secure_cookie);
    Ok((jar.add(cookie), found(&result.redirect_uri)).into_response())
}

/// Guarded phase: session check, whitelist check, forward.
async fn guarded(state: &GateState, jar: &CookieJar, request: Request) -> Result<Response, AppError> {
    let identity = jar.get(SESSION_COOKIE_NAME).and_then(|cookie| {
        verify_session_token(cookie.value(), &state.key)
            .inspect_err(|e| tracing::debug!(error = %e, "Session cookie rejected"))
            .ok()
    });

    let Some(identity) = identity else {
        return login_redirect(state, request.headers(), request.uri()).await;
    };

    if !state.whitelist.is_authorized(&identity) {
        state.events.emit(FlowEvent::Forbidden {
            id: identity.id,
            login: identity.login,
        });
        return Err(AppError::Forbidden);
    }

    state.events.emit(FlowEvent::Forwarded {
        login: identity.login,
    });
    state.origin.forward(request).await
}

/// Ask the authority for a login URL and send the browser there.
async fn login_redirect(
    state: &GateState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Response, AppError> {
    let Some((scheme, host)) = request_origin(headers, &state.config.default_scheme) else {
        state.events.emit(FlowEvent::LoginRedirectFailed {
            reason: "request has no host".to_string(),
        });
        return Err(AppError::Validation("missing host header".to_string()));
    };

    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let redirect_uri = format!("{scheme}://{host}{path_and_query}");
    let auth_url = format!("{scheme}://{host}{}", state.config.auth_path);

    let page_url = state
        .authority
        .generate_oauth_page_url(&redirect_uri, &auth_url)
        .await
        .map_err(|e| {
            state.events.emit(FlowEvent::LoginRedirectFailed {
                reason: e.to_string(),
            });
            AppError::Internal(e.into())
        })?;

    state
        .events
        .emit(FlowEvent::LoginRedirect { uri: redirect_uri });

    Ok(found(&page_url))
}
