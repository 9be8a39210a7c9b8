//! Client configuration.
//!
//! [`ClientConfig`] carries everything the default HTTP transport needs. Applications
//! construct it however they like; the crate never reads environment variables or
//! configuration files on its own.
//!
//! # Example
//!
//! ```rust
//! use minds_sdk::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("my-api-key")
//!     .with_base_url("https://custom_cloud.mdb.ai/")
//!     .with_timeout(Duration::from_secs(60));
//!
//! assert_eq!(config.api_url(), "https://custom_cloud.mdb.ai/api");
//! ```

use std::time::Duration;

/// Hosted service used when no base URL is given.
pub const DEFAULT_BASE_URL: &str = "https://mdb.ai";

/// Project that owns the caller's Minds unless told otherwise.
pub const DEFAULT_PROJECT: &str = "mindsdb";

/// Settings for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API key sent as a bearer token on every request.
    pub api_key: String,
    /// Root URL of the service, with or without the trailing `/api`.
    pub base_url: String,
    /// Project under which Minds live.
    pub project: String,
    /// Whole-request timeout. `None` leaves the request unbounded.
    pub timeout: Option<Duration>,
    /// Connection establishment timeout.
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for the hosted service with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            timeout: None,
            connect_timeout: None,
        }
    }

    /// Point the client at another deployment. An empty string keeps the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url;
        }
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The normalised API root: trailing slashes removed and `/api` appended once.
    pub fn api_url(&self) -> String {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.ends_with("/api") {
            trimmed.to_string()
        } else {
            format!("{}/api", trimmed)
        }
    }
}
