//! Configuration for the task sync engine.
//!
//! # Example
//!
//! ```
//! use task_sync_engine::SyncConfig;
//!
//! // Defaults: v8 API, local SQLite file, 30 s request timeout
//! let config = SyncConfig::default();
//! assert_eq!(config.api_version, "v8/");
//! assert_eq!(config.database_url, "sqlite:todoist.db");
//!
//! // Full config
//! let config = SyncConfig {
//!     api_endpoint: "https://api.todoist.com/sync/".into(),
//!     api_token: "0123456789abcdef".into(),
//!     request_timeout_secs: 10,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.base_url(), "https://api.todoist.com/sync/v8/");
//! ```

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Configuration for one sync run.
///
/// The endpoint and token have no usable default and must be supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Remote API root, e.g. "https://api.todoist.com/sync/"
    #[serde(default)]
    pub api_endpoint: String,

    /// API version path segment appended to the endpoint (default: "v8/")
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Bearer token
    #[serde(default)]
    pub api_token: String,

    /// Local store connection string (e.g., "sqlite:todoist.db" or "sqlite::memory:")
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Per-request timeout for remote calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_version() -> String { "v8/".to_string() }
fn default_database_url() -> String { "sqlite:todoist.db".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            api_version: default_api_version(),
            api_token: String::new(),
            database_url: default_database_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncConfig {
    /// Check that everything a run needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("api_endpoint"));
        }
        if !(self.api_endpoint.starts_with("http://") || self.api_endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "api_endpoint",
                reason: format!("'{}' is not an http(s) URL", self.api_endpoint),
            });
        }
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::Missing("api_token"));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Missing("database_url"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Endpoint joined with the version segment; remote paths are appended
    /// to this verbatim.
    #[must_use]
    pub fn base_url(&self) -> String {
        let mut base = self.api_endpoint.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        base.push_str(self.api_version.trim_start_matches('/'));
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }
}
