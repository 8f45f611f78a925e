//! Origin forwarding

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, header},
    response::Response,
};
use reqwest::{Client, redirect::Policy};
use std::time::Duration;
use url::Url;

use crate::error::AppError;

/// Largest request body relayed to the origin.
const MAX_FORWARD_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Reverse proxy client for the protected origin.
#[derive(Debug, Clone)]
pub struct OriginClient {
    origin: Url,
    client: Client,
}

impl OriginClient {
    pub fn new(origin_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let origin = Url::parse(origin_url)
            .map_err(|e| AppError::Config(format!("origin_url is not a valid URL: {e}")))?;
        // Origin redirects go back to the browser untouched.
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self { origin, client })
    }

    /// Origin URL for a request path and optional query.
    fn target(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.origin.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{path}"));
        url.set_query(query);
        url
    }

    /// Relay `request` to the origin and its answer back.
    ///
    /// # Errors
    /// Returns [`AppError::Origin`] when the origin cannot be reached and
    /// [`AppError::Validation`] when the request body is too large.
    pub async fn forward(&self, request: Request) -> Result<Response, AppError> {
        let (parts, body) = request.into_parts();
        let target = self.target(parts.uri.path(), parts.uri.query());

        let body = to_bytes(body, MAX_FORWARD_BODY_BYTES)
            .await
            .map_err(|e| AppError::Validation(format!("failed to read request body: {e}")))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        tracing::debug!(method = %parts.method, %target, "Forwarding request");

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Origin(e.to_string()))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| AppError::Origin(e.to_string()))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use wiremock::matchers::{body_string, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn target_keeps_origin_prefix_and_query() {
        let client = OriginClient::new("http://origin.local/app/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.target("/docs/page", Some("a=1&b=2")).as_str(),
            "http://origin.local/app/docs/page?a=1&b=2"
        );
        assert_eq!(
            client.target("/", None).as_str(),
            "http://origin.local/app/"
        );
    }

    #[test]
    fn rejects_invalid_origin() {
        let error = OriginClient::new("not a url", Duration::from_secs(1)).expect_err("must fail");
        assert!(matches!(error, AppError::Config(_)));
    }

    #[tokio::test]
    async fn forwards_method_path_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(query_param("x", "1"))
            .and(header_eq("x-custom", "yes"))
            .and(body_string("payload"))
            .respond_with(
                ResponseTemplate::new(207)
                    .insert_header("x-origin", "here")
                    .set_body_string("relayed"),
            )
            .mount(&server)
            .await;

        let client = OriginClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit?x=1")
            .header("x-custom", "yes")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from("payload"))
            .unwrap();

        let response = client.forward(request).await.expect("forwarded");
        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        assert_eq!(response.headers()["x-origin"], "here");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"relayed");
    }

    #[tokio::test]
    async fn origin_redirects_are_relayed_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let client = OriginClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let request = Request::builder().uri("/old").body(Body::empty()).unwrap();

        let response = client.forward(request).await.expect("forwarded");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/new");
    }

    #[tokio::test]
    async fn unreachable_origin_is_bad_gateway() {
        let client = OriginClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let error = client.forward(request).await.expect_err("must fail");
        assert!(matches!(error, AppError::Origin(_)));

        let response = axum::response::IntoResponse::into_response(error);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("127.0.0.1"));
    }
}
