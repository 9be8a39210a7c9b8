//! HTTP client pool for maintaining persistent connections.
//!
//! Every [`HttpTransport`](crate::minds::http_transport::HttpTransport) pointed at the
//! same API root with the same timeouts shares one `reqwest::Client`, so handles and
//! managers created from separate [`Client`](crate::Client)s still reuse connections
//! instead of paying for DNS and TLS on each request.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use lazy_static::lazy_static;

use crate::minds::config::ClientConfig;
use crate::minds::error::{MindsError, Result};

lazy_static! {
    /// Global cache of HTTP clients, keyed by API root and timeout settings.
    static ref CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> = Mutex::new(HashMap::new());
}

fn pool_key(config: &ClientConfig) -> String {
    format!(
        "{}|{:?}|{:?}",
        config.api_url(),
        config.timeout,
        config.connect_timeout
    )
}

/// Creates or retrieves the shared HTTP client for `config`.
///
/// The client is configured with:
/// - up to 16 idle connections per host, kept for 90 seconds
/// - TCP keepalive every 60 seconds
/// - the request and connect timeouts from `config`, when set
pub fn get_or_create_client(config: &ClientConfig) -> Result<reqwest::Client> {
    let key = pool_key(config);
    let mut pool = CLIENT_POOL
        .lock()
        .map_err(|_| MindsError::Transport("HTTP client pool lock poisoned".into()))?;

    if let Some(client) = pool.get(&key) {
        return Ok(client.clone());
    }

    let client = create_pooled_client(config)?;
    pool.insert(key, client.clone());
    Ok(client)
}

fn create_pooled_client(config: &ClientConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .user_agent(concat!("minds-sdk/", env!("CARGO_PKG_VERSION")));

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| MindsError::Transport(format!("Failed to build HTTP client: {}", e)))
}
