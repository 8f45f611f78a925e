//! Common test utilities for E2E tests
//!
//! Boots a real authority, gate and origin on ephemeral ports, with a
//! wiremock server standing in for GitHub.

#![allow(dead_code)]

use axum::{Router, extract::Request, http::HeaderMap};
use github_oauth_gate::{
    AuthorityState, GateState, authority_router,
    authority::provider::{GithubEndpoints, GithubProvider},
    config::{
        AttemptConfig, AuthorityConfig, GateConfig, GitHubOAuthConfig, HttpConfig, LoggingConfig,
        MetricsConfig, ServerConfig, SessionConfig, ShutdownConfig, WhitelistConfig,
    },
    events::TracingEventSink,
    gate::SessionKey,
    gate_router, server,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_SECRET: &str = "test-api-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUTH_PATH: &str = "/_auth";

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

/// HTTP client that never follows redirects, so each hop can be asserted.
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Fake GitHub OAuth and user API.
pub struct FakeGithub {
    pub server: MockServer,
}

impl FakeGithub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn endpoints(&self) -> GithubEndpoints {
        GithubEndpoints {
            authorize: format!("{}/login/oauth/authorize", self.server.uri()),
            token: format!("{}/login/oauth/access_token", self.server.uri()),
            user: format!("{}/user", self.server.uri()),
        }
    }

    /// Accept `code` and resolve it to the given user.
    pub async fn grant(&self, code: &str, id: i64, login: &str) {
        let access_token = format!("access-{code}");

        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": access_token,
                "token_type": "bearer",
                "scope": ""
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", format!("Bearer {access_token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "login": login
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject every code the way GitHub does: 200 with an error body.
    pub async fn reject_all(&self) {
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .mount(&self.server)
            .await;
    }
}

/// Test authority instance
pub struct TestAuthority {
    pub addr: String,
    pub state: AuthorityState,
    pub client: reqwest::Client,
}

impl TestAuthority {
    pub async fn new(github: &FakeGithub, api_secret_key: &str) -> Self {
        Self::with_ttl(github, api_secret_key, 600).await
    }

    pub async fn with_ttl(github: &FakeGithub, api_secret_key: &str, ttl_seconds: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let config = AuthorityConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            api_base_url: addr.clone(),
            api_secret_key: api_secret_key.to_string(),
            github: GitHubOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                scopes: vec!["read:user".to_string()],
            },
            attempt: AttemptConfig {
                ttl_seconds,
                cleanup_interval_seconds: 1800,
            },
            http: HttpConfig { timeout_seconds: 5 },
            shutdown: ShutdownConfig { drain_seconds: 1 },
            logging: LoggingConfig::default(),
        };

        let provider = GithubProvider::with_endpoints(
            &config.github,
            Duration::from_secs(5),
            github.endpoints(),
        )
        .unwrap();
        let state =
            AuthorityState::with_parts(config, Arc::new(provider), Arc::new(TracingEventSink));
        let router = authority_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            state,
            client: no_redirect_client(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create an attempt through the public endpoint and return its rid.
    pub async fn create_attempt(&self, redirect_uri: &str, auth_url: &str) -> String {
        let response = self
            .client
            .post(self.url("/oauth/page-url"))
            .header("Authorization", format!("token {API_SECRET}"))
            .json(&serde_json::json!({
                "redirect_uri": redirect_uri,
                "auth_url": auth_url,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: serde_json::Value = response.json().await.unwrap();
        let page_url = body["oauth_page_url"].as_str().unwrap();
        rid_from_page_url(page_url)
    }
}

/// Provider callback URL embedded in a login page URL.
pub fn callback_from_page_url(page_url: &str) -> url::Url {
    let page_url = url::Url::parse(page_url).unwrap();
    let redirect_uri = page_url
        .query_pairs()
        .find(|(key, _)| key == "redirect_uri")
        .map(|(_, value)| value.into_owned())
        .expect("page url carries redirect_uri");
    url::Url::parse(&redirect_uri).unwrap()
}

/// Attempt id carried by a login page URL.
pub fn rid_from_page_url(page_url: &str) -> String {
    query_value(&callback_from_page_url(page_url), "rid").expect("callback carries rid")
}

pub fn query_value(url: &url::Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Origin that echoes what it received.
pub struct TestOrigin {
    pub addr: String,
}

impl TestOrigin {
    pub async fn start() -> Self {
        async fn echo(headers: HeaderMap, request: Request) -> String {
            let cookie = headers
                .get("cookie")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            format!(
                "origin saw {} {} cookie={}",
                request.method(),
                request.uri(),
                !cookie.is_empty()
            )
        }

        let addr = spawn(Router::new().fallback(echo)).await;
        Self {
            addr: format!("http://{addr}"),
        }
    }
}

/// Test gate instance
pub struct TestGate {
    pub addr: String,
    pub metrics_addr: String,
    pub state: GateState,
    pub client: reqwest::Client,
}

impl TestGate {
    pub async fn new(authority: &TestAuthority, origin: &TestOrigin, whitelist: WhitelistConfig) -> Self {
        let config = GateConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            origin_url: origin.addr.clone(),
            api_base_url: authority.addr.clone(),
            api_secret_key: API_SECRET.to_string(),
            auth_path: AUTH_PATH.to_string(),
            jwt_secret_key: Some(JWT_SECRET.to_string()),
            default_scheme: "http".to_string(),
            session: SessionConfig {
                ttl_seconds: 604_800,
                secure_cookie: false,
            },
            whitelist,
            http: HttpConfig { timeout_seconds: 5 },
            metrics: MetricsConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            shutdown: ShutdownConfig { drain_seconds: 1 },
            logging: LoggingConfig::default(),
        };

        let state = GateState::with_parts(
            config,
            SessionKey::from_secret(JWT_SECRET),
            Arc::new(TracingEventSink),
        )
        .unwrap();
        let addr = spawn(gate_router(state.clone())).await;
        let metrics_addr = spawn(server::metrics_router()).await;

        Self {
            addr: format!("http://{addr}"),
            metrics_addr: format!("http://{metrics_addr}"),
            state,
            client: no_redirect_client(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// Whitelist admitting one login.
pub fn whitelist_login(login: &str) -> WhitelistConfig {
    WhitelistConfig {
        ids: Vec::new(),
        logins: vec![login.to_string()],
    }
}

/// `Location` header of a redirect response.
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect carries a location")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(github_oauth_gate::model::SESSION_COOKIE_NAME))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}
