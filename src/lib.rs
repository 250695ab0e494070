//! Optimistic engagement synchronization: like and saved-list toggles applied locally at once,
//! coalesced per entity and written to the server after a debounce window.

pub mod config;
pub mod engine;
pub mod error;
pub mod remote;
pub mod replay;
