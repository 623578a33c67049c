//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys
//! use a double underscore: `BACKEND__BASE_URL`, `SESSION__SECURE_COOKIES`,
//! `COOKIES__TOKEN`, `PROXY__STRICT_STATUS_CODES`, `PROXY__MAX_UPLOAD_BYTES`.

use campus_console_bff::{BackendConfig, CookieNames, ProxyConfig, SessionSettings};
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Institution backend connection.
    pub backend: BackendConfig,

    /// Session cookie behaviour.
    #[serde(default)]
    pub session: SessionSettings,

    /// Cookie names per identity concern.
    #[serde(default)]
    pub cookies: CookieNames,

    /// Proxy error reporting.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
