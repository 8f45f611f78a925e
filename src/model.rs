//! Wire types shared by the authority and the gate
//!
//! Both sides serialize the same request and response bodies, so they live
//! here instead of in either component.

use serde::{Deserialize, Serialize};
use url::Url;

/// Route prefix of the authority's OAuth endpoints.
pub const OAUTH_PATH: &str = "/oauth";
pub const PAGE_URL_PATH: &str = "/page-url";
pub const REDIRECT_PATH: &str = "/redirect";
pub const RESULT_PATH: &str = "/result";
pub const HEALTH_PATH: &str = "/health";

/// Query key carrying the attempt id.
pub const QUERY_KEY_RID: &str = "rid";

/// Scheme used in the `Authorization` header for the shared API secret.
pub const AUTHORIZATION_PREFIX_TOKEN: &str = "token";

/// `Authorization` header value carrying the shared API secret.
pub fn authorization_value(secret: &str) -> String {
    format!("{AUTHORIZATION_PREFIX_TOKEN} {secret}")
}

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "com.github.muxiu1997.traefik-github-oauth-plugin.jwt";

/// Default local callback path on the gate.
pub const DEFAULT_AUTH_PATH: &str = "/_auth";

/// `<base>/oauth<endpoint>`, keeping any path prefix on `base` and dropping
/// its query.
pub fn oauth_endpoint_url(base: &str, endpoint: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base_path}{OAUTH_PATH}{endpoint}"));
    url.set_query(None);
    Ok(url)
}

/// POST /oauth/page-url body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageUrlRequest {
    /// Original resource to return to after login
    pub redirect_uri: String,
    /// Gate-local callback URL the authority bounces back to
    pub auth_url: String,
}

impl PageUrlRequest {
    /// Reject empty fields the same way missing ones are rejected.
    pub fn validate(&self) -> Result<(), String> {
        require("redirect_uri", &self.redirect_uri)?;
        require("auth_url", &self.auth_url)
    }
}

/// POST /oauth/page-url response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageUrlResponse {
    pub oauth_page_url: String,
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

/// GET /oauth/redirect query
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectQuery {
    pub rid: String,
    pub code: String,
}

impl RedirectQuery {
    pub fn validate(&self) -> Result<(), String> {
        require("rid", &self.rid)?;
        require("code", &self.code)
    }
}

/// GET /oauth/result query
#[derive(Debug, Clone, Deserialize)]
pub struct ResultQuery {
    pub rid: String,
}

impl ResultQuery {
    pub fn validate(&self) -> Result<(), String> {
        require("rid", &self.rid)
    }
}

/// GET /oauth/result response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResult {
    pub redirect_uri: String,
    pub github_user_id: String,
    pub github_user_login: String,
}

/// Authenticated principal as reported by GitHub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Numeric GitHub user id in decimal form
    pub id: String,
    /// GitHub login
    pub login: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            login: login.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_request_requires_both_fields() {
        let request = PageUrlRequest {
            redirect_uri: "https://app.example.com/".to_string(),
            auth_url: " ".to_string(),
        };
        assert_eq!(request.validate(), Err("auth_url is required".to_string()));

        let request = PageUrlRequest {
            redirect_uri: String::new(),
            auth_url: "https://app.example.com/_auth".to_string(),
        };
        assert_eq!(
            request.validate(),
            Err("redirect_uri is required".to_string())
        );
    }

    #[test]
    fn query_validation_rejects_blank_values() {
        let query = RedirectQuery {
            rid: "01HZX".to_string(),
            code: String::new(),
        };
        assert_eq!(query.validate(), Err("code is required".to_string()));

        let query = RedirectQuery {
            rid: " ".to_string(),
            code: "c".to_string(),
        };
        assert_eq!(query.validate(), Err("rid is required".to_string()));

        let query = ResultQuery { rid: String::new() };
        assert_eq!(query.validate(), Err("rid is required".to_string()));
        assert!(ResultQuery { rid: "01HZX".to_string() }.validate().is_ok());
    }

    #[test]
    fn oauth_endpoint_url_keeps_base_path() {
        let url = oauth_endpoint_url("https://auth.example.com/broker/", RESULT_PATH).unwrap();
        assert_eq!(url.as_str(), "https://auth.example.com/broker/oauth/result");

        let url = oauth_endpoint_url("http://127.0.0.1:8080", PAGE_URL_PATH).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/oauth/page-url");
    }

    #[test]
    fn auth_result_uses_github_field_names() {
        let result = AuthResult {
            redirect_uri: "https://app.example.com/".to_string(),
            github_user_id: "42".to_string(),
            github_user_login: "octocat".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["github_user_id"], "42");
        assert_eq!(value["github_user_login"], "octocat");
    }
}
