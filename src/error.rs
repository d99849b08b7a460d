//! Error types for devto-feed
//!
//! This module provides the error handling for the library, including:
//! - The crate-wide [`Error`] covering request construction, transport, and decoding
//! - The decoder's own [`DecodeError`], which names the offending field
//! - [`ErrorInfo`], a cloneable description kept in the feed's error slot
//! - Machine-readable error codes for presentation layers

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for devto-feed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for devto-feed
///
/// Every variant is recoverable at the feed boundary: a failed load leaves the
/// accumulated articles untouched and records an [`ErrorInfo`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The request URL could not be constructed from the configured base
    #[error("invalid request target: {0}")]
    InvalidRequestTarget(String),

    /// The server answered with a non-success status, or the request could not complete
    #[error("request failed: {message}")]
    RequestFailed {
        /// HTTP status code, when the server answered at all
        status: Option<u16>,
        /// Human-readable description of the failure
        message: String,
    },

    /// Transport-level failure reported by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not satisfy the article contract
    #[error("decode failed: {0}")]
    DecodeFailed(#[from] DecodeError),

    /// The response body was empty where content was expected
    #[error("no data received")]
    NoData,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "page_size")
        key: Option<String>,
    },
}

impl Error {
    /// Stable, machine-readable code for this error kind
    ///
    /// Transport errors share the `request_failed` code with non-success statuses,
    /// since both mean the request did not produce a usable response.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidRequestTarget(_) => "invalid_request_target",
            Error::RequestFailed { .. } | Error::Network(_) => "request_failed",
            Error::DecodeFailed(_) => "decode_failed",
            Error::NoData => "no_data",
            Error::Config { .. } => "config_error",
        }
    }

    /// HTTP status attached to this error, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RequestFailed { status, .. } => *status,
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure to turn a JSON record into an article
///
/// Field names are the wire names, prefixed with the parent record for nested
/// objects (e.g. `user.username`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field is absent or null
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field is present but holds the wrong JSON type
    #[error("invalid type for field `{field}`: expected {expected}")]
    InvalidType {
        /// Field that failed
        field: String,
        /// Expected JSON shape (e.g. "string", "integer")
        expected: &'static str,
    },

    /// A record that should be a JSON object is something else
    #[error("expected an object for {context}")]
    NotAnObject {
        /// What was being decoded ("article")
        context: String,
    },

    /// A list response was not a JSON array
    #[error("expected an array of articles")]
    NotAnArray,

    /// A record inside a page failed to decode
    #[error("article at index {index}: {source}")]
    InPage {
        /// Position of the failing record within the page
        index: usize,
        /// The underlying failure
        #[source]
        source: Box<DecodeError>,
    },

    /// The body is not valid JSON
    #[error("malformed JSON: {0}")]
    Json(String),
}

impl DecodeError {
    /// Name of the field that failed, if the failure is tied to one
    pub fn field(&self) -> Option<&str> {
        match self {
            DecodeError::MissingField(field) | DecodeError::InvalidType { field, .. } => {
                Some(field)
            }
            DecodeError::InPage { source, .. } => source.field(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e.to_string())
    }
}

/// Cloneable error description for observers
///
/// The feed keeps this in its `last_error` slot and sends it with failure events;
/// the source [`Error`] is not `Clone` (it may wrap a transport error).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code (see [`Error::error_code`])
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl From<&Error> for ErrorInfo {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
