//! Client for the authority's gate-facing endpoints

use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;

use crate::model::{
    AuthResult, PAGE_URL_PATH, PageUrlRequest, PageUrlResponse, QUERY_KEY_RID, RESULT_PATH,
    authorization_value, oauth_endpoint_url,
};

/// Failures talking to the authority.
#[derive(Debug, Error)]
pub enum AuthorityClientError {
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("authority request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid api secret key")]
    InvalidApiSecret,

    #[error("{operation} failed, status code: {status}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },
}

/// HTTP client for the authority.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    base_url: String,
    api_secret_key: String,
    http_client: Client,
}

impl AuthorityClient {
    /// Create a client for `base_url`; an empty `api_secret_key` sends no
    /// `Authorization` header.
    pub fn new(
        base_url: impl Into<String>,
        api_secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthorityClientError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            api_secret_key: api_secret_key.into(),
            http_client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_secret_key.is_empty() {
            request
        } else {
            request.header(header::AUTHORIZATION, authorization_value(&self.api_secret_key))
        }
    }

    /// POST /oauth/page-url
    ///
    /// Returns the provider login URL the browser should be sent to.
    pub async fn generate_oauth_page_url(
        &self,
        redirect_uri: &str,
        auth_url: &str,
    ) -> Result<String, AuthorityClientError> {
        let url = oauth_endpoint_url(&self.base_url, PAGE_URL_PATH)?;
        let body = PageUrlRequest {
            redirect_uri: redirect_uri.to_string(),
            auth_url: auth_url.to_string(),
        };

        let response = self
            .authorize(self.http_client.post(url))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {}
            StatusCode::UNAUTHORIZED => return Err(AuthorityClientError::InvalidApiSecret),
            status => {
                return Err(AuthorityClientError::UnexpectedStatus {
                    operation: "generate oauth page url",
                    status,
                });
            }
        }

        let page: PageUrlResponse = response.json().await?;
        Ok(page.oauth_page_url)
    }

    /// GET /oauth/result
    ///
    /// Claims the identity of a completed attempt. The authority forgets the
    /// attempt afterwards.
    pub async fn fetch_auth_result(&self, rid: &str) -> Result<AuthResult, AuthorityClientError> {
        let mut url = oauth_endpoint_url(&self.base_url, RESULT_PATH)?;
        url.query_pairs_mut().append_pair(QUERY_KEY_RID, rid);

        let response = self.authorize(self.http_client.get(url)).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(AuthorityClientError::InvalidApiSecret),
            status => {
                return Err(AuthorityClientError::UnexpectedStatus {
                    operation: "get auth result",
                    status,
                });
            }
        }

        Ok(response.json().await?)
    }
}
