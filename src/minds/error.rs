//! Error types shared by every Minds operation.
//!
//! All fallible calls in this crate return [`MindsError`]. Input problems are reported as
//! [`MindsError::Validation`] before anything goes over the wire; everything else maps a
//! server answer (or the lack of one) onto a variant the caller can match on.
//!
//! ```rust
//! use minds_sdk::{MindsError, ResourceKind};
//!
//! let err = MindsError::NotFound {
//!     resource: ResourceKind::Mind,
//!     name: "m1".to_string(),
//! };
//! assert!(err.is_not_found());
//! assert_eq!(err.to_string(), "Mind not found: m1");
//! ```

use std::error::Error;
use std::fmt;

/// The kind of remote object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A datasource registered with the service.
    Datasource,
    /// A Mind.
    Mind,
    /// The attachment of a datasource to a Mind.
    Attachment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Datasource => write!(f, "Datasource"),
            ResourceKind::Mind => write!(f, "Mind"),
            ResourceKind::Attachment => write!(f, "Datasource attachment"),
        }
    }
}

/// Errors returned by the Minds client.
#[derive(Debug, Clone, PartialEq)]
pub enum MindsError {
    /// Malformed or missing input, detected before any network call.
    Validation(String),
    /// A create without replace targeted a name that already exists.
    AlreadyExists { resource: ResourceKind, name: String },
    /// The targeted name does not exist on the server.
    NotFound { resource: ResourceKind, name: String },
    /// The server answered with a non-success status.
    RemoteService { status: u16, message: String },
    /// A completion stream broke off before its end-of-stream marker.
    StreamInterrupted {
        chunks_delivered: usize,
        reason: String,
    },
    /// The request never produced a response (DNS, TLS, connection reset...).
    Transport(String),
    /// The response body could not be decoded into the expected shape.
    Decode(String),
}

impl MindsError {
    pub fn validation(message: impl Into<String>) -> Self {
        MindsError::Validation(message.into())
    }

    pub fn not_found(resource: ResourceKind, name: impl Into<String>) -> Self {
        MindsError::NotFound {
            resource,
            name: name.into(),
        }
    }

    pub fn already_exists(resource: ResourceKind, name: impl Into<String>) -> Self {
        MindsError::AlreadyExists {
            resource,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MindsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, MindsError::AlreadyExists { .. })
    }

    /// HTTP status carried by the error, if it came from a server answer.
    pub fn status(&self) -> Option<u16> {
        match self {
            MindsError::RemoteService { status, .. } => Some(*status),
            MindsError::NotFound { .. } => Some(404),
            MindsError::AlreadyExists { .. } => Some(409),
            _ => None,
        }
    }
}

impl fmt::Display for MindsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MindsError::Validation(msg) => write!(f, "Invalid input: {}", msg),
            MindsError::AlreadyExists { resource, name } => {
                write!(f, "{} already exists: {}", resource, name)
            }
            MindsError::NotFound { resource, name } => {
                write!(f, "{} not found: {}", resource, name)
            }
            MindsError::RemoteService { status, message } => {
                write!(f, "Remote service error ({}): {}", status, message)
            }
            MindsError::StreamInterrupted {
                chunks_delivered,
                reason,
            } => write!(
                f,
                "Completion stream interrupted after {} chunk(s): {}",
                chunks_delivered, reason
            ),
            MindsError::Transport(msg) => write!(f, "Transport error: {}", msg),
            MindsError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl Error for MindsError {}

impl From<serde_json::Error> for MindsError {
    fn from(err: serde_json::Error) -> Self {
        MindsError::Decode(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MindsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = MindsError::already_exists(ResourceKind::Datasource, "pg");
        assert_eq!(err.to_string(), "Datasource already exists: pg");

        let err = MindsError::RemoteService {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Remote service error (500): boom");

        let err = MindsError::not_found(ResourceKind::Attachment, "pg");
        assert_eq!(err.to_string(), "Datasource attachment not found: pg");
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(MindsError::not_found(ResourceKind::Mind, "m").status(), Some(404));
        assert_eq!(MindsError::validation("x").status(), None);
        assert_eq!(
            MindsError::RemoteService {
                status: 503,
                message: String::new()
            }
            .status(),
            Some(503)
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err: MindsError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, MindsError::Decode(_)));
    }
}
