//! Optimistic engagement engine: local state, pending writes, settle and flush.

mod coordinator;
mod flush;
mod key;
mod registry;
mod state;
mod store;
mod view;

pub use self::coordinator::{SettleOutcome, ToggleCoordinator, ToggleOutcome};
pub use self::flush::{FlushController, FlushReport};
pub use self::key::{EngagementKey, TargetType};
pub use self::registry::{
    Armed, Expiry, OperationId, PendingOperation, PendingOperationRegistry, Retirement,
};
pub use self::state::EngagementState;
pub use self::store::{EngagementStore, SeedMode};
pub use self::view::ViewScope;
