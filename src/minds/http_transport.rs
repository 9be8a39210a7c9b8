//! Default [`Transport`] over HTTP.
//!
//! Requests go to `<api_url><path>` with the API key as a bearer token and JSON bodies.
//! Responses are decoded leniently: an empty body becomes `null` and a body that is not
//! JSON is kept as a string so error messages survive.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::minds::config::ClientConfig;
use crate::minds::error::{MindsError, Result};
use crate::minds::http_client_pool::get_or_create_client;
use crate::minds::transport::{error_message, ByteStream, Method, Transport, TransportResponse};

/// `reqwest` backed transport bound to one API root and key.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport from `config`, reusing a pooled HTTP client when possible.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MindsError::validation("API key must not be empty"));
        }
        Ok(HttpTransport {
            client: get_or_create_client(config)?,
            api_url: config.api_url(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        log::debug!("minds_sdk::HttpTransport: {} {}", method, url);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key);
        if streaming {
            req = req.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        req.send().await.map_err(|e| {
            log::error!("minds_sdk::HttpTransport: {} {} failed: {}", method, url, e);
            MindsError::Transport(format!("{} {} failed: {}", method, url, e))
        })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Decode a response body the way the managers expect it.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse> {
        let response = self.send(method, path, body, false).await?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| MindsError::Transport(format!("Failed to read response body: {}", e)))?;

        if !(200..300).contains(&status) {
            log::debug!(
                "minds_sdk::HttpTransport: {} answered {}: {}",
                path,
                status,
                text
            );
        }
        Ok(TransportResponse::new(status, decode_body(&text)))
    }

    async fn request_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ByteStream> {
        let response = self.send(method, path, body, true).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&decode_body(&text));
            log::error!(
                "minds_sdk::HttpTransport: stream {} answered {}: {}",
                path,
                status,
                message
            );
            return Err(MindsError::RemoteService {
                status: status.as_u16(),
                message,
            });
        }

        let chunks = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| MindsError::Transport(format!("Stream read error: {}", e)))
        });
        Ok(Box::pin(chunks))
    }
}
