use dashmap::{DashMap, mapref::entry::Entry};

use super::{EngagementKey, EngagementState};

/// How a server-reported state is installed into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Only insert when nothing is loaded for the key yet.
    IfAbsent,
    /// Replace whatever is loaded (explicit reload of a list or detail view).
    Reload,
}

/// In-memory engagement state per key. Pure container, no I/O.
#[derive(Debug, Default)]
pub struct EngagementStore {
    states: DashMap<EngagementKey, EngagementState>,
}

impl EngagementStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `key`, if loaded.
    pub fn get(&self, key: &EngagementKey) -> Option<EngagementState> {
        self.states.get(key).map(|entry| *entry.value())
    }

    /// Install a server-reported state. Returns `false` when `IfAbsent` found an existing entry.
    pub fn seed(&self, key: EngagementKey, state: EngagementState, mode: SeedMode) -> bool {
        match (self.states.entry(key), mode) {
            (Entry::Occupied(_), SeedMode::IfAbsent) => false,
            (Entry::Occupied(mut occupied), SeedMode::Reload) => {
                occupied.insert(state);
                true
            }
            (Entry::Vacant(vacant), _) => {
                vacant.insert(state);
                true
            }
        }
    }

    /// Atomically apply `delta` to the state of `key`, returning `(before, after)`.
    ///
    /// Returns `None` when the key is not loaded.
    pub fn mutate<F>(
        &self,
        key: &EngagementKey,
        delta: F,
    ) -> Option<(EngagementState, EngagementState)>
    where
        F: FnOnce(EngagementState) -> EngagementState,
    {
        let mut entry = self.states.get_mut(key)?;
        let before = *entry.value();
        let after = delta(before);
        *entry.value_mut() = after;
        Some((before, after))
    }

    /// Replace the state of a loaded key. Unloaded keys are left alone so a settle
    /// that resolves after eviction does not resurrect the entity.
    pub fn overwrite(&self, key: &EngagementKey, state: EngagementState) -> bool {
        match self.states.get_mut(key) {
            Some(mut entry) => {
                *entry.value_mut() = state;
                true
            }
            None => false,
        }
    }

    /// Drop the state of `key`, returning it if it was loaded.
    pub fn remove(&self, key: &EngagementKey) -> Option<EngagementState> {
        self.states.remove(key).map(|(_, state)| state)
    }
}
