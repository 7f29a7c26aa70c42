//! API credentials and endpoint configuration
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `.env` file in the working directory
//! 3. Configuration file (config/sky-flights.toml, any format `config` supports)
//! 4. Environment variables prefixed with `SKY_FLIGHTS_`

use crate::FlightError;
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroize;

pub const DEFAULT_API_HOST: &str = "sky-scrapper.p.rapidapi.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// An API key that never exposes its value in logs or debug output.
#[derive(Clone)]
pub struct RedactedApiKey {
    inner: String,
}

impl RedactedApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { inner: key.into() }
    }

    /// The actual key value, only for sending in request headers.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl fmt::Debug for RedactedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedApiKey([REDACTED])")
    }
}

impl fmt::Display for RedactedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED API KEY]")
    }
}

impl Drop for RedactedApiKey {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

/// Connection settings for the Sky-Scrapper API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: RedactedApiKey,
    pub api_host: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Flat settings as read from file and environment
#[derive(Deserialize)]
struct Settings {
    api_key: Option<String>,
    api_host: String,
    base_url: Option<String>,
    timeout_secs: u64,
}

impl ApiConfig {
    /// Build a configuration for the given key and RapidAPI host.
    pub fn new(api_key: impl Into<String>, api_host: impl Into<String>) -> Result<Self, FlightError> {
        let api_key = RedactedApiKey::new(api_key);
        if api_key.is_empty() {
            return Err(FlightError::MissingApiKey);
        }

        let api_host = api_host.into();
        let base_url = format!("https://{}", api_host);

        Ok(Self {
            api_key,
            api_host,
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Point requests at a different endpoint root, keeping the host header.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, FlightError> {
        // A missing .env file is fine
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let settings = Config::builder()
            .set_default("api_host", DEFAULT_API_HOST)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .add_source(File::with_name("config/sky-flights").required(false))
            // e.g., SKY_FLIGHTS_API_KEY -> api_key
            .add_source(Environment::with_prefix("SKY_FLIGHTS").try_parsing(true))
            .build()?;

        Self::from_settings(settings.try_deserialize()?)
    }

    fn from_settings(settings: Settings) -> Result<Self, FlightError> {
        let api_key = settings.api_key.ok_or(FlightError::MissingApiKey)?;
        let mut config = Self::new(api_key, settings.api_host)?
            .with_timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(base_url) = settings.base_url.filter(|url| !url.trim().is_empty()) {
            config = config.with_base_url(base_url);
        }

        debug!(
            api_host = %config.api_host,
            base_url = %config.base_url,
            timeout_secs = settings.timeout_secs,
            "API configuration loaded"
        );
        Ok(config)
    }
}
