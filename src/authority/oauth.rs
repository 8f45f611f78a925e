//! Authority OAuth endpoints
//!
//! State machine over [`PendingAuthAttempt`]:
//! `created` (page-url) -> `exchanged` (redirect) -> `consumed` (result),
//! with expiry possible from either live state.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use url::Url;

use super::AuthorityState;
use super::store::PendingAuthAttempt;
use crate::error::AppError;
use crate::events::FlowEvent;
use crate::model::{
    AuthResult, PageUrlRequest, PageUrlResponse, QUERY_KEY_RID, REDIRECT_PATH, RedirectQuery,
    ResultQuery, oauth_endpoint_url,
};
use crate::server::found;

/// Set `rid` on `url`, keeping every other query pair.
pub(crate) fn with_rid(url: &Url, rid: &str) -> Url {
    let mut url = url.clone();
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != QUERY_KEY_RID)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &retained {
            query.append_pair(key, value);
        }
        query.append_pair(QUERY_KEY_RID, rid);
    }

    url
}

/// Provider callback URL: `<api_base_url>/oauth/redirect?rid=<rid>`.
fn build_redirect_uri(api_base_url: &str, rid: &str) -> Result<String, AppError> {
    let url = oauth_endpoint_url(api_base_url, REDIRECT_PATH).map_err(|e| {
        AppError::Config(format!("invalid api base url in server config: {e}"))
    })?;

    Ok(with_rid(&url, rid).to_string())
}

/// GET /
pub async fn banner() -> &'static str {
    "GitHub OAuth Authority"
}

/// GET /oauth/health
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// POST /oauth/page-url
///
/// Stores a new attempt and returns the provider login URL whose callback
/// carries the fresh attempt id.
pub async fn page_url(
    State(state): State<AuthorityState>,
    body: Result<Json<PageUrlRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    request.validate().map_err(AppError::Validation)?;

    let rid = state
        .store
        .insert(PendingAuthAttempt::new(request.redirect_uri, request.auth_url))
        .await;
    let redirect_uri = match build_redirect_uri(&state.config.api_base_url, &rid) {
        Ok(uri) => uri,
        Err(error) => {
            state.store.pop(&rid).await;
            return Err(error);
        }
    };
    let oauth_page_url = state.provider.authorization_url(&redirect_uri);

    state.events.emit(FlowEvent::AttemptCreated { rid });

    Ok((StatusCode::CREATED, Json(PageUrlResponse { oauth_page_url })).into_response())
}

/// GET /oauth/redirect
///
/// Provider-facing. Exchanges the code, records the identity on the attempt
/// and bounces the browser to the gate callback with the same rid.
pub async fn redirect(
    State(state): State<AuthorityState>,
    query: Result<Query<RedirectQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    query.validate().map_err(AppError::Validation)?;

    let attempt = match state.store.get(&query.rid).await {
        Some(attempt) if !attempt.is_exchanged() => attempt,
        _ => {
            state.events.emit(FlowEvent::InvalidRid { rid: query.rid });
            return Err(AppError::InvalidRid);
        }
    };

    let auth_url = Url::parse(&attempt.auth_url).map_err(|e| {
        state.events.emit(FlowEvent::ExchangeFailed {
            rid: query.rid.clone(),
            reason: format!("invalid auth_url: {e}"),
        });
        AppError::Config(format!("invalid auth_url stored for attempt: {e}"))
    })?;

    let identity = state.provider.identify(&query.code).await.map_err(|e| {
        state.events.emit(FlowEvent::ExchangeFailed {
            rid: query.rid.clone(),
            reason: e.to_string(),
        });
        AppError::Upstream(e.to_string())
    })?;

    let login = identity.login.clone();
    if !state.store.complete(&query.rid, identity).await {
        // Expired or raced with another exchange while the provider answered.
        state.events.emit(FlowEvent::InvalidRid { rid: query.rid });
        return Err(AppError::InvalidRid);
    }

    state.events.emit(FlowEvent::AttemptExchanged {
        rid: query.rid.clone(),
        login,
    });

    Ok(found(with_rid(&auth_url, &query.rid).as_str()))
}

/// GET /oauth/result
///
/// Consumes the attempt. Unknown, expired, consumed and never-exchanged ids
/// all answer `invalid rid`.
pub async fn result(
    State(state): State<AuthorityState>,
    query: Result<Query<ResultQuery>, QueryRejection>,
) -> Result<Json<AuthResult>, AppError> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    query.validate().map_err(AppError::Validation)?;

    let Some(PendingAuthAttempt {
        redirect_uri,
        identity: Some(identity),
        ..
    }) = state.store.pop(&query.rid).await
    else {
        state.events.emit(FlowEvent::InvalidRid { rid: query.rid });
        return Err(AppError::InvalidRid);
    };

    state.events.emit(FlowEvent::AttemptConsumed { rid: query.rid });

    Ok(Json(AuthResult {
        redirect_uri,
        github_user_id: identity.id,
        github_user_login: identity.login,
    }))
}
