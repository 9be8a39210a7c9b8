//! The seam between the resource managers and the wire.
//!
//! A [`Transport`] performs one request against a path relative to the API root and hands
//! back the status plus the decoded JSON body. It does not interpret statuses: mapping a
//! 404 to [`MindsError::NotFound`] needs to know *what* was looked up, so that happens in
//! the managers through [`TransportResponse::into_result`].
//!
//! The default implementation is [`HttpTransport`](crate::minds::http_transport::HttpTransport).
//! Tests and embedders can supply their own:
//!
//! ```rust
//! use async_trait::async_trait;
//! use minds_sdk::transport::{ByteStream, Method, Transport, TransportResponse};
//! use minds_sdk::MindsError;
//! use serde_json::{json, Value};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl Transport for Offline {
//!     async fn request(
//!         &self,
//!         _method: Method,
//!         _path: &str,
//!         _body: Option<Value>,
//!     ) -> Result<TransportResponse, MindsError> {
//!         Ok(TransportResponse::new(200, json!([])))
//!     }
//!
//!     async fn request_stream(
//!         &self,
//!         _method: Method,
//!         _path: &str,
//!         _body: Option<Value>,
//!     ) -> Result<ByteStream, MindsError> {
//!         Err(MindsError::Transport("offline".into()))
//!     }
//! }
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::minds::error::{MindsError, ResourceKind, Result};

pub use reqwest::Method;

/// Raw body chunks of a streamed response, in arrival order.
///
/// Dropping the stream must release the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Status and decoded body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON. An empty body decodes to `Value::Null`, a non-JSON body to
    /// `Value::String`.
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        TransportResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success status into the matching [`MindsError`].
    ///
    /// `resource` and `name` describe what the request targeted and end up in
    /// `NotFound` / `AlreadyExists`.
    pub fn into_result(self, resource: ResourceKind, name: &str) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(status_error(self.status, &self.body, resource, name))
    }

    /// Like [`into_result`](Self::into_result) for requests that target no single
    /// resource, such as list endpoints: every failure is a `RemoteService` error.
    pub fn into_remote_result(self) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(MindsError::RemoteService {
            status: self.status,
            message: error_message(&self.body),
        })
    }
}

/// Map a failed status onto an error variant.
pub(crate) fn status_error(
    status: u16,
    body: &Value,
    resource: ResourceKind,
    name: &str,
) -> MindsError {
    let message = error_message(body);
    match status {
        404 => MindsError::not_found(resource, name),
        409 => MindsError::already_exists(resource, name),
        400 if message.to_lowercase().contains("already exists") => {
            MindsError::already_exists(resource, name)
        }
        _ => MindsError::RemoteService { status, message },
    }
}

/// Map a failed completion answer. Only a missing Mind gets its own variant, so the
/// buffered and streamed modes fail the same way.
pub(crate) fn completion_error(status: u16, message: String, mind: &str) -> MindsError {
    match status {
        404 => MindsError::not_found(ResourceKind::Mind, mind),
        _ => MindsError::RemoteService { status, message },
    }
}

/// Best-effort human readable message out of an error body.
pub(crate) fn error_message(body: &Value) -> String {
    match body {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            for key in ["detail", "message", "error"] {
                match map.get(key) {
                    Some(Value::String(s)) => return s.clone(),
                    Some(nested @ Value::Object(_)) => return error_message(nested),
                    _ => {}
                }
            }
            body.to_string()
        }
        other => other.to_string(),
    }
}

/// Transport collaborator used by every manager and handle.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request and return the status with the decoded body.
    ///
    /// Errors are reserved for requests that never produced a response.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse>;

    /// Open a streamed request.
    ///
    /// A non-success status is reported as [`MindsError::RemoteService`] before any
    /// chunk is returned.
    async fn request_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ByteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_passes_body_through() {
        let resp = TransportResponse::new(201, json!({"name": "a"}));
        assert_eq!(
            resp.into_result(ResourceKind::Mind, "a").unwrap(),
            json!({"name": "a"})
        );
    }

    #[test]
    fn test_status_mapping() {
        let err = TransportResponse::new(404, Value::Null)
            .into_result(ResourceKind::Datasource, "pg")
            .unwrap_err();
        assert_eq!(err, MindsError::not_found(ResourceKind::Datasource, "pg"));

        let err = TransportResponse::new(409, json!({"detail": "conflict"}))
            .into_result(ResourceKind::Mind, "m")
            .unwrap_err();
        assert!(err.is_already_exists());

        let err = TransportResponse::new(400, json!({"detail": "Database 'pg' already exists"}))
            .into_result(ResourceKind::Datasource, "pg")
            .unwrap_err();
        assert!(err.is_already_exists());

        let err = TransportResponse::new(400, json!({"detail": "bad engine"}))
            .into_result(ResourceKind::Datasource, "pg")
            .unwrap_err();
        assert_eq!(
            err,
            MindsError::RemoteService {
                status: 400,
                message: "bad engine".into()
            }
        );
    }

    #[test]
    fn test_list_failures_carry_no_resource_name() {
        let err = TransportResponse::new(404, json!({"detail": "no such project"}))
            .into_remote_result()
            .unwrap_err();
        assert_eq!(
            err,
            MindsError::RemoteService {
                status: 404,
                message: "no such project".into()
            }
        );
        assert_eq!(
            TransportResponse::new(200, json!([])).into_remote_result().unwrap(),
            json!([])
        );
    }

    #[test]
    fn test_completion_error_only_special_cases_missing_mind() {
        assert_eq!(
            completion_error(404, "gone".into(), "m1"),
            MindsError::not_found(ResourceKind::Mind, "m1")
        );
        for (status, message) in [(409, "conversation busy"), (400, "Session already exists")] {
            assert_eq!(
                completion_error(status, message.into(), "m1"),
                MindsError::RemoteService {
                    status,
                    message: message.into()
                }
            );
        }
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"error": {"message": "nested"}})), "nested");
        assert_eq!(error_message(&json!("plain")), "plain");
        assert_eq!(error_message(&Value::Null), "");
        assert_eq!(error_message(&json!({"x": 1})), r#"{"x":1}"#);
    }
}
