//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the storefront backend (e.g. `https://api.example.com/api/`)
//!
//! ## Optional
//! - `STOREFRONT_API_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `STOREFRONT_MAX_RETRIES` - Retries for rate-limited requests (default: 3)
//! - `STOREFRONT_RETRY_BASE_MS` - Base backoff delay in milliseconds (default: 1000)
//! - `STOREFRONT_FETCH_THROTTLE_MS` - Minimum gap between resource re-fetches (default: 1000)
//! - `STOREFRONT_LOGIN_ROUTE` - Route to redirect to on session expiry (default: /login)
//! - `STOREFRONT_REGISTER_ROUTE` - Registration route (default: /register)

use std::time::Duration;

use storefront_client_core::AuthRoutes;
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Backoff and retry limits for rate-limited requests
    pub retry: RetryPolicy,
    /// Minimum gap between non-retry fetches of the same resource
    pub fetch_throttle: Duration,
    /// Login and registration routes
    pub routes: AuthRoutes,
}

impl ClientConfig {
    /// Default per-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default fetch throttle window in milliseconds.
    pub const DEFAULT_FETCH_THROTTLE_MS: u64 = 1000;

    /// Create a configuration with defaults for everything but the base URL.
    ///
    /// A trailing slash is added to the base URL if missing so that relative
    /// request paths are joined beneath it rather than replacing its last segment.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            fetch_throttle: Duration::from_millis(Self::DEFAULT_FETCH_THROTTLE_MS),
            routes: AuthRoutes::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_required_env("STOREFRONT_API_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_API_URL".to_string(), e.to_string())
        })?;

        let timeout_secs = parse_env_or_default("STOREFRONT_API_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?;
        let max_retries = parse_env_or_default("STOREFRONT_MAX_RETRIES", RetryPolicy::DEFAULT_MAX_RETRIES)?;
        let base_delay_ms = parse_env_or_default(
            "STOREFRONT_RETRY_BASE_MS",
            u64::try_from(RetryPolicy::DEFAULT_BASE_DELAY.as_millis()).unwrap_or(1000),
        )?;
        let throttle_ms =
            parse_env_or_default("STOREFRONT_FETCH_THROTTLE_MS", Self::DEFAULT_FETCH_THROTTLE_MS)?;

        let routes = AuthRoutes::new(
            get_env_or_default("STOREFRONT_LOGIN_ROUTE", AuthRoutes::DEFAULT_LOGIN),
            get_env_or_default("STOREFRONT_REGISTER_ROUTE", AuthRoutes::DEFAULT_REGISTER),
        );

        Ok(Self {
            base_url: normalize_base_url(base_url),
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(base_delay_ms)),
            fetch_throttle: Duration::from_millis(throttle_ms),
            routes,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Ensure the base URL path ends with `/`.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to a default.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
