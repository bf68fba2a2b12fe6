//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Scopes the relay always requests, ahead of any operator-configured extras.
pub const REQUIRED_SCOPES: &str = "assets:read,assets:write,sites:read";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How the session cookie's `Secure` attribute is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CookieSecure {
    /// Secure only when the request arrived over HTTPS.
    Auto,
    Always,
    Never,
}

impl FromStr for CookieSecure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(CookieSecure::Auto),
            "true" | "1" | "yes" => Ok(CookieSecure::Always),
            "false" | "0" | "no" => Ok(CookieSecure::Never),
            other => Err(format!("'{}' is not one of auto, true, false", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Extra scopes beyond `REQUIRED_SCOPES`, comma or space separated.
    pub extra_scopes: String,
    pub authorize_url: String,
    pub oauth_base: String,
    pub api_base: String,
    /// Where to land after authorization when no trusted target was supplied.
    pub post_auth_redirect: String,
    pub cors_origins: Vec<String>,
    pub cookie_secure: CookieSecure,
    pub trust_proxy: bool,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load OAuth Client Settings ---
        let client_id = required("WEBFLOW_CLIENT_ID")?;
        let client_secret = required("WEBFLOW_CLIENT_SECRET")?;
        let redirect_uri = required("WEBFLOW_REDIRECT_URI")?;
        let extra_scopes = var_or("WEBFLOW_SCOPES", "");

        // --- Load Upstream Endpoints ---
        let authorize_url = var_or("WEBFLOW_AUTHORIZE_URL", "https://webflow.com/oauth/authorize");
        let oauth_base = var_or("WEBFLOW_OAUTH_BASE", "https://api.webflow.com")
            .trim_end_matches('/')
            .to_string();
        let api_base = var_or("WEBFLOW_API_BASE", "https://api.webflow.com/v2")
            .trim_end_matches('/')
            .to_string();

        // --- Load Browser-facing Settings ---
        let post_auth_redirect = var_or("POST_AUTH_REDIRECT", "/");
        let cors_origins = var_or("CORS_ORIGINS", "")
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let cookie_secure = var_or("COOKIE_SECURE", "auto")
            .parse::<CookieSecure>()
            .map_err(|e| ConfigError::InvalidValue("COOKIE_SECURE".to_string(), e))?;
        let trust_proxy = parse_bool("TRUST_PROXY", &var_or("TRUST_PROXY", "false"))?;

        Ok(Self {
            bind_address,
            log_level,
            client_id,
            client_secret,
            redirect_uri,
            extra_scopes,
            authorize_url,
            oauth_base,
            api_base,
            post_auth_redirect,
            cors_origins,
            cookie_secure,
            trust_proxy,
        })
    }
}
