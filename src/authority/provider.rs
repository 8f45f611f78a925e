//! GitHub OAuth provider
//!
//! The authority only needs two things from the identity provider: a login
//! URL to send the browser to, and a way to turn the returned authorization
//! code into an [`Identity`]. Both sit behind [`IdentityProvider`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::GitHubOAuthConfig;
use crate::model::Identity;

/// GitHub OAuth endpoints.
pub const AUTHORIZATION_ENDPOINT: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";
pub const USER_ENDPOINT: &str = "https://api.github.com/user";

const USER_AGENT: &str = "github-oauth-gate";

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token exchange failed with status {status}")]
    TokenExchange { status: u16 },

    #[error("token exchange rejected: {0}")]
    Rejected(String),

    #[error("user lookup failed with status {status}")]
    UserLookup { status: u16 },

    #[error("invalid {name} endpoint: {source}")]
    InvalidEndpoint {
        name: &'static str,
        source: url::ParseError,
    },
}

/// Identity provider used by the authority.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider login page that returns to `redirect_uri` afterwards.
    fn authorization_url(&self, redirect_uri: &str) -> String;

    /// Exchange an authorization code for the identity that granted it.
    async fn identify(&self, code: &str) -> Result<Identity, ProviderError>;
}

/// GitHub access token response.
///
/// GitHub answers 200 with an `error` field for bad codes.
#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user response.
#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
}

/// Endpoint set, overridable so tests can point at a fake server.
#[derive(Debug, Clone)]
pub struct GithubEndpoints {
    pub authorize: String,
    pub token: String,
    pub user: String,
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZATION_ENDPOINT.to_string(),
            token: TOKEN_ENDPOINT.to_string(),
            user: USER_ENDPOINT.to_string(),
        }
    }
}

fn parse_endpoint(name: &'static str, value: &str) -> Result<Url, ProviderError> {
    Url::parse(value).map_err(|source| ProviderError::InvalidEndpoint { name, source })
}

/// GitHub OAuth provider.
#[derive(Debug, Clone)]
pub struct GithubProvider {
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    authorize_url: Url,
    token_url: Url,
    user_url: Url,
    http_client: Client,
}

impl GithubProvider {
    /// Create a provider for github.com with the given request timeout.
    pub fn new(config: &GitHubOAuthConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_endpoints(config, timeout, GithubEndpoints::default())
    }

    /// Create a provider talking to custom endpoints.
    ///
    /// # Errors
    /// Returns error if an endpoint is not a valid URL or the HTTP client
    /// cannot be built
    pub fn with_endpoints(
        config: &GitHubOAuthConfig,
        timeout: Duration,
        endpoints: GithubEndpoints,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            authorize_url: parse_endpoint("authorize", &endpoints.authorize)?,
            token_url: parse_endpoint("token", &endpoints.token)?,
            user_url: parse_endpoint("user", &endpoints.user)?,
            http_client,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::TokenExchange {
                status: status.as_u16(),
            });
        }

        let token: GithubTokenResponse = response.json().await?;
        match (token.access_token, token.error) {
            (Some(access_token), None) if !access_token.is_empty() => Ok(access_token),
            (_, Some(error)) => Err(ProviderError::Rejected(
                token.error_description.unwrap_or(error),
            )),
            _ => Err(ProviderError::Rejected(
                "response carried no access token".to_string(),
            )),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, ProviderError> {
        let response = self
            .http_client
            .get(self.user_url.clone())
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UserLookup {
                status: status.as_u16(),
            });
        }

        let user: GithubUser = response.json().await?;
        Ok(Identity::new(user.id.to_string(), user.login))
    }
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    fn authorization_url(&self, redirect_uri: &str) -> String {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            query.append_pair("response_type", "code");
        }

        url.to_string()
    }

    async fn identify(&self, code: &str) -> Result<Identity, ProviderError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_user(&access_token).await
    }
}
