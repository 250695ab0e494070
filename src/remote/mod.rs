//! Boundary to the server that owns the authoritative engagement state.

#[cfg(feature = "http-remote")]
pub mod http;

use std::error::Error as StdError;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::engine::{EngagementKey, EngagementState};

/// Result alias for remote sync calls.
pub type RemoteResult<T> = Result<T, NetworkError>;

/// Failure of a remote write, regardless of the transport underneath.
///
/// Every variant is recovered the same way: the pending operation is rolled back.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never produced a usable answer (connection, timeout, undecodable body).
    #[error("remote unavailable: {message}")]
    Unavailable {
        /// Human readable summary.
        message: String,
        /// Transport error that caused the failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The server answered with a failure status.
    #[error("remote rejected request: {message}")]
    Rejected {
        /// Human readable summary, including the status.
        message: String,
    },
}

impl NetworkError {
    /// Construct an unavailable error from any transport failure.
    pub fn unavailable(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        NetworkError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Construct a rejection from a failure status.
    pub fn rejected(message: impl Into<String>) -> Self {
        NetworkError::Rejected {
            message: message.into(),
        }
    }
}

/// Performs the network write for one engagement domain.
pub trait RemoteSync: Send + Sync {
    /// Make the server reflect `desired.engaged` for `key` and return the authoritative state.
    fn push(
        &self,
        key: &EngagementKey,
        desired: EngagementState,
    ) -> BoxFuture<'static, RemoteResult<EngagementState>>;
}
