//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MAISON_API_BASE_URL` - Base URL of the Maison REST API
//!
//! ## Optional
//! - `MAISON_MEDIA_BASE_URL` - Base URL for product imagery (default: the API base)
//! - `MAISON_CREDENTIAL_PATH` - Path of the persisted credential file
//!   (default: `maison-credentials.json`)
//! - `MAISON_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

const DEFAULT_CREDENTIAL_PATH: &str = "maison-credentials.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

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
    /// Base URL of the Maison REST API.
    pub api_base_url: Url,
    /// Base URL against which relative image paths are resolved.
    pub media_base_url: Url,
    /// Where the credential token and user record are persisted.
    pub credential_path: PathBuf,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_url("MAISON_API_BASE_URL", &get_required_env("MAISON_API_BASE_URL")?)?;
        let media_base_url = match get_optional_env("MAISON_MEDIA_BASE_URL") {
            Some(raw) => parse_url("MAISON_MEDIA_BASE_URL", &raw)?,
            None => api_base_url.clone(),
        };
        let credential_path =
            PathBuf::from(get_env_or_default("MAISON_CREDENTIAL_PATH", DEFAULT_CREDENTIAL_PATH));
        let request_timeout_secs = get_env_or_default(
            "MAISON_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("MAISON_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_base_url,
            media_base_url,
            credential_path,
            request_timeout_secs,
        })
    }

    /// Build a configuration directly, for embedding and for tests.
    #[must_use]
    pub const fn new(
        api_base_url: Url,
        media_base_url: Url,
        credential_path: PathBuf,
        request_timeout_secs: u64,
    ) -> Self {
        Self {
            api_base_url,
            media_base_url,
            credential_path,
            request_timeout_secs,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment value as an absolute URL.
fn parse_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}
