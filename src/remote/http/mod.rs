//! REST implementation of [`RemoteSync`](super::RemoteSync) for the forum and saved-list API.

mod client;
mod config;
mod error;
mod models;

pub use client::HttpRemoteSync;
pub use config::{DEFAULT_TIMEOUT, RemoteConfig};
pub use error::{HttpRemoteError, HttpResult};
