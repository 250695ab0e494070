use dashmap::DashSet;
use tracing::{debug, warn};

use crate::error::EngineError;

use super::{
    EngagementKey, EngagementState, FlushController, FlushReport, SeedMode, ToggleCoordinator,
    ToggleOutcome,
};

/// Binds a hosting view (a post detail, a saved list) to the engine.
///
/// The scope remembers which keys the view loaded so it can discard them when the view goes
/// away, and flushes pending writes before the view's context changes.
pub struct ViewScope {
    coordinator: ToggleCoordinator,
    flush: FlushController,
    context: String,
    keys: DashSet<EngagementKey>,
}

impl ViewScope {
    /// Bind a view showing `context` to `coordinator`.
    pub fn new(coordinator: ToggleCoordinator, context: impl Into<String>) -> Self {
        Self {
            flush: FlushController::new(coordinator.clone()),
            coordinator,
            context: context.into(),
            keys: DashSet::new(),
        }
    }

    /// Label of the entity the view currently shows.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Load server state for a key shown by this view.
    pub fn seed(&self, key: EngagementKey, state: EngagementState, mode: SeedMode) -> bool {
        self.keys.insert(key.clone());
        self.coordinator.seed(key, state, mode)
    }

    /// See [`ToggleCoordinator::toggle`].
    pub fn toggle(&self, key: &EngagementKey) -> ToggleOutcome {
        self.coordinator.toggle(key)
    }

    /// Current local state of `key`.
    pub fn state(&self, key: &EngagementKey) -> Option<EngagementState> {
        self.coordinator.state(key)
    }

    /// Push pending writes out without leaving the view.
    pub async fn flush(&self) -> FlushReport {
        self.flush.flush_all().await
    }

    /// The view is about to show another entity: flush, drop the old keys, rebind.
    pub async fn on_target_change(&mut self, context: impl Into<String>) -> FlushReport {
        let context = context.into();
        let report = self.flush.flush_all().await;
        self.release_keys();
        debug!(from = %self.context, to = %context, "view rebound");
        self.context = context;
        report
    }

    /// The view is being torn down: flush and drop its keys.
    pub async fn on_unmount(self) -> FlushReport {
        let report = self.flush.flush_all().await;
        self.release_keys();
        debug!(context = %self.context, "view unmounted");
        report
    }

    fn release_keys(&self) {
        let keys: Vec<_> = self.keys.iter().map(|key| key.key().clone()).collect();
        for key in keys {
            match self.coordinator.evict(&key) {
                Ok(_) | Err(EngineError::NotLoaded(_)) => {
                    self.keys.remove(&key);
                }
                Err(err) => {
                    warn!(
                        context = %self.context,
                        key = %key,
                        error = %err,
                        "keeping engagement loaded"
                    );
                }
            }
        }
    }
}
