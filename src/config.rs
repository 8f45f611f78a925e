//! Configuration management
//!
//! Each binary loads its own configuration from:
//! 1. Default values
//! 2. Configuration file (config/authority.toml or config/gate.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::model::DEFAULT_AUTH_PATH;

/// Authority service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    pub server: ServerConfig,
    /// Public base URL of this service, used to build the provider callback
    pub api_base_url: String,
    /// Shared secret expected from gates; empty disables the check
    #[serde(default)]
    pub api_secret_key: String,
    pub github: GitHubOAuthConfig,
    pub attempt: AttemptConfig,
    pub http: HttpConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

/// Gate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub server: ServerConfig,
    /// Protected origin every authorized request is forwarded to
    pub origin_url: String,
    /// Authority base URL
    pub api_base_url: String,
    /// Shared secret sent to the authority; empty sends none
    #[serde(default)]
    pub api_secret_key: String,
    /// Local callback path (normalized to start with `/`)
    pub auth_path: String,
    /// Session signing key; a random key is generated when absent
    pub jwt_secret_key: Option<String>,
    /// Scheme assumed when the request carries no `X-Forwarded-Proto`
    pub default_scheme: String,
    pub session: SessionConfig,
    pub whitelist: WhitelistConfig,
    pub http: HttpConfig,
    pub metrics: MetricsConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Gate metrics listener
///
/// Every gate path belongs to the origin, so `/metrics` is served on its own
/// address.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl MetricsConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Scopes requested on the authorize URL; GitHub's default when empty
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Pending login attempt lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct AttemptConfig {
    /// Attempt expiry in seconds (default: 600 = 10 minutes)
    pub ttl_seconds: u64,
    /// Expired attempt sweep interval in seconds (default: 1800 = 30 minutes)
    pub cleanup_interval_seconds: u64,
}

impl AttemptConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Token and cookie lifetime in seconds (default: 604800 = 7 days)
    pub ttl_seconds: i64,
    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,
}

/// Whitelist of GitHub identities allowed past the gate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistConfig {
    /// GitHub user ids
    #[serde(default)]
    pub ids: Vec<String>,
    /// GitHub user logins
    #[serde(default)]
    pub logins: Vec<String>,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 10)
    pub timeout_seconds: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Graceful shutdown configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests after a shutdown signal
    pub drain_seconds: u64,
}

impl ShutdownConfig {
    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "pretty" or "json"
    pub format: String,
    /// Raise the default filter to debug
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            debug_mode: false,
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/authority.toml (if exists)
    /// 3. Environment variables (AUTHORITY__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("api_secret_key", "")?
            .set_default("attempt.ttl_seconds", 600)?
            .set_default("attempt.cleanup_interval_seconds", 1800)?
            .set_default("http.timeout_seconds", 10)?
            .set_default("shutdown.drain_seconds", 10)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.debug_mode", false)?
            .add_source(File::with_name("config/authority").required(false))
            .add_source(
                Environment::with_prefix("AUTHORITY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("github.scopes")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let authority_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        authority_config.validate()?;
        Ok(authority_config)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        validate_base_url("api_base_url", &self.api_base_url)?;

        if self.github.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "github.client_id must not be empty".to_string(),
            ));
        }
        if self.github.client_secret.trim().is_empty() {
            return Err(AppError::Config(
                "github.client_secret must not be empty".to_string(),
            ));
        }
        if self.attempt.ttl_seconds == 0 {
            return Err(AppError::Config(
                "attempt.ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.attempt.cleanup_interval_seconds == 0 {
            return Err(AppError::Config(
                "attempt.cleanup_interval_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Warn about settings that are valid but weaken the deployment.
    pub fn log_warnings(&self) {
        if self.api_secret_key.is_empty() {
            tracing::warn!(
                "api_secret_key is empty; page-url and result endpoints accept unauthenticated callers"
            );
        }
    }
}

impl GateConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/gate.toml (if exists)
    /// 3. Environment variables (GATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8081)?
            .set_default("api_secret_key", "")?
            .set_default("auth_path", DEFAULT_AUTH_PATH)?
            .set_default("default_scheme", "http")?
            .set_default("session.ttl_seconds", 604800)?
            .set_default("session.secure_cookie", false)?
            .set_default("whitelist.ids", Vec::<String>::new())?
            .set_default("whitelist.logins", Vec::<String>::new())?
            .set_default("http.timeout_seconds", 10)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "127.0.0.1")?
            .set_default("metrics.port", 9091)?
            .set_default("shutdown.drain_seconds", 10)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.debug_mode", false)?
            .add_source(File::with_name("config/gate").required(false))
            .add_source(
                Environment::with_prefix("GATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("whitelist.ids")
                    .with_list_parse_key("whitelist.logins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut gate_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        gate_config.auth_path = normalize_auth_path(&gate_config.auth_path);
        gate_config.validate()?;
        Ok(gate_config)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        validate_base_url("api_base_url", &self.api_base_url)?;
        validate_base_url("origin_url", &self.origin_url)?;

        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(AppError::Config(
                "default_scheme must be http or https".to_string(),
            ));
        }
        if self.session.ttl_seconds <= 0 {
            return Err(AppError::Config(
                "session.ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if matches!(self.jwt_secret_key.as_deref(), Some(key) if key.is_empty()) {
            return Err(AppError::Config(
                "jwt_secret_key must not be empty when set".to_string(),
            ));
        }
        if self.metrics.enabled && self.metrics.bind_address() == self.server.bind_address() {
            return Err(AppError::Config(
                "metrics listener must not share the gate's address".to_string(),
            ));
        }

        Ok(())
    }

    /// Warn about settings that are valid but probably unintended.
    pub fn log_warnings(&self) {
        if self.whitelist.ids.is_empty() && self.whitelist.logins.is_empty() {
            tracing::warn!("Whitelist is empty; every authenticated user will be rejected");
        }
        if self.api_secret_key.is_empty() {
            tracing::warn!("api_secret_key is empty; authority calls are sent without a secret");
        }
    }
}

/// Ensure the callback path starts with `/`.
pub fn normalize_auth_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return DEFAULT_AUTH_PATH.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn validate_base_url(field: &str, value: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::Config(format!("{field} is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "{field} must use http or https"
        )));
    }
    Ok(())
}
