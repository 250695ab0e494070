//! Errors returned synchronously by engine calls.

use thiserror::Error;

use crate::engine::EngagementKey;

/// Errors raised by engine operations that callers invoke directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The key still has a pending operation and must be flushed first.
    #[error("engagement `{0}` has a pending operation")]
    PendingOperation(EngagementKey),
    /// Nothing is loaded for the key.
    #[error("engagement `{0}` is not loaded")]
    NotLoaded(EngagementKey),
}
