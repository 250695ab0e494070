//! Error types shared by the HTTP remote implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::remote::NetworkError;

/// Convenient result alias returning [`HttpRemoteError`] failures.
pub type HttpResult<T> = Result<T, HttpRemoteError>;

/// Failures that can occur while talking to the engagement API.
#[derive(Debug, Error)]
pub enum HttpRemoteError {
    /// Required environment variable is missing.
    #[error("missing engagement API environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for engagement API environment variable `{var}`")]
    InvalidEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build engagement API client")]
    ClientBuilder {
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or timed out.
    #[error("failed to send engagement API request to `{path}`")]
    RequestSend {
        /// API path relative to the base URL.
        path: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a non-success status code.
    #[error("unexpected engagement API response status {status} for `{path}`")]
    RequestStatus {
        /// API path relative to the base URL.
        path: String,
        /// Status returned by the API.
        status: StatusCode,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode engagement API response for `{path}`")]
    DecodeResponse {
        /// API path relative to the base URL.
        path: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpRemoteError> for NetworkError {
    fn from(err: HttpRemoteError) -> Self {
        match err {
            HttpRemoteError::RequestStatus { .. } => NetworkError::rejected(err.to_string()),
            other => NetworkError::unavailable(other.to_string(), other),
        }
    }
}
