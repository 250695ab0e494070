use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    sync::{Mutex, mpsc},
    task::AbortHandle,
    time::{Instant, sleep},
};
use tracing::debug;
use uuid::Uuid;

use crate::config::SyncConfig;

use super::{EngagementKey, EngagementState};

/// Unique identifier of one pending operation instance.
pub type OperationId = Uuid;

/// Public view of a scheduled network write for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Identity used to detect supersession when a settle resolves late.
    pub id: OperationId,
    /// Key this operation writes.
    pub key: EngagementKey,
    /// Last server-confirmed state, restored if the write fails.
    pub snapshot: EngagementState,
    /// When the debounce timer was last (re)armed.
    pub scheduled_at: Instant,
}

/// Message emitted by a debounce timer when its delay elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    /// Key whose timer elapsed.
    pub key: EngagementKey,
    /// Operation the timer was armed for.
    pub id: OperationId,
    /// Timer generation at arming time; stale once the timer is refreshed or cancelled.
    pub generation: u64,
}

/// Result of [`PendingOperationRegistry::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Armed {
    /// No operation existed; a new one was created with a fresh snapshot.
    Created(OperationId),
    /// An operation was waiting; only its timer was restarted.
    Refreshed(OperationId),
    /// The previous operation is already settling; a successor replaced it.
    Superseding {
        /// The new operation.
        id: OperationId,
        /// The operation whose network call is still in flight.
        previous: OperationId,
    },
}

impl Armed {
    /// Identifier of the operation now pending for the key.
    pub fn id(&self) -> OperationId {
        match *self {
            Armed::Created(id) | Armed::Refreshed(id) | Armed::Superseding { id, .. } => id,
        }
    }
}

/// Result of [`PendingOperationRegistry::retire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// The operation was still current and has been removed.
    Retired,
    /// A newer operation owns the key; it was left in place with a rebased snapshot.
    Superseded {
        /// The operation now pending for the key.
        successor: OperationId,
    },
    /// Nothing is registered for the key any more.
    Missing,
}

struct Slot {
    operation: PendingOperation,
    generation: u64,
    timer: Option<AbortHandle>,
    settling: bool,
}

impl Slot {
    /// Abort the timer and invalidate any expiry it may already have sent.
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Owns at most one pending operation per key together with its debounce timer.
pub struct PendingOperationRegistry {
    slots: DashMap<EngagementKey, Slot>,
    gates: DashMap<EngagementKey, Arc<Mutex<()>>>,
    expiries: mpsc::UnboundedSender<Expiry>,
    config: SyncConfig,
}

impl PendingOperationRegistry {
    /// Create a registry whose timers report to `expiries`.
    pub fn new(config: SyncConfig, expiries: mpsc::UnboundedSender<Expiry>) -> Self {
        Self {
            slots: DashMap::new(),
            gates: DashMap::new(),
            expiries,
            config,
        }
    }

    /// Arm (or re-arm) the debounce timer for `key`.
    ///
    /// `local_mutation` runs while the key's slot is locked, applies the optimistic change and
    /// returns the state from before it. That state becomes the snapshot only when a new
    /// operation is created; an existing waiting operation keeps its snapshot. Returns `None`
    /// without touching the registry when `local_mutation` does.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, key: &EngagementKey, local_mutation: F) -> Option<Armed>
    where
        F: FnOnce() -> Option<EngagementState>,
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) if !occupied.get().settling => {
                local_mutation()?;
                let slot = occupied.get_mut();
                slot.cancel_timer();
                slot.operation.scheduled_at = Instant::now();
                slot.timer = Some(self.spawn_timer(key, slot.operation.id, slot.generation));
                debug!(key = %key, id = %slot.operation.id, "debounce timer refreshed");
                Some(Armed::Refreshed(slot.operation.id))
            }
            Entry::Occupied(mut occupied) => {
                let snapshot = local_mutation()?;
                let previous = occupied.get().operation.id;
                let slot = self.new_slot(key, snapshot);
                let id = slot.operation.id;
                occupied.insert(slot);
                debug!(key = %key, %id, %previous, "pending operation armed behind in-flight settle");
                Some(Armed::Superseding { id, previous })
            }
            Entry::Vacant(vacant) => {
                let snapshot = local_mutation()?;
                let slot = self.new_slot(key, snapshot);
                let id = slot.operation.id;
                vacant.insert(slot);
                debug!(key = %key, %id, "pending operation armed");
                Some(Armed::Created(id))
            }
        }
    }

    /// Cancel the timer of `key` (if any) and return its operation without removing it.
    ///
    /// Once this returns, an expiry from the cancelled timer can no longer claim the operation.
    pub fn cancel_and_get(&self, key: &EngagementKey) -> Option<PendingOperation> {
        let mut slot = self.slots.get_mut(key)?;
        slot.cancel_timer();
        Some(slot.operation.clone())
    }

    /// Mark the operation `id` as settling so nothing else can settle it.
    ///
    /// With `generation` set (timer path) the claim also requires that the timer was neither
    /// refreshed nor cancelled since it was started.
    pub fn claim(
        &self,
        key: &EngagementKey,
        id: OperationId,
        generation: Option<u64>,
    ) -> Option<PendingOperation> {
        let mut slot = self.slots.get_mut(key)?;
        if slot.operation.id != id || slot.settling {
            return None;
        }
        if generation.is_some_and(|generation| generation != slot.generation) {
            return None;
        }

        slot.cancel_timer();
        slot.settling = true;
        Some(slot.operation.clone())
    }

    /// Remove operation `id` once its settle finished.
    ///
    /// `reconcile` runs under the slot lock right before removal, and only if `id` is still the
    /// current operation. When a successor has replaced it, the successor's snapshot is set to
    /// `confirmed` instead and nothing is removed.
    pub fn retire<F>(
        &self,
        key: &EngagementKey,
        id: OperationId,
        confirmed: EngagementState,
        reconcile: F,
    ) -> Retirement
    where
        F: FnOnce(),
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(occupied) if occupied.get().operation.id == id => {
                reconcile();
                occupied.remove();
                Retirement::Retired
            }
            Entry::Occupied(mut occupied) => {
                let successor = occupied.get_mut();
                successor.operation.snapshot = confirmed;
                Retirement::Superseded {
                    successor: successor.operation.id,
                }
            }
            Entry::Vacant(_) => Retirement::Missing,
        }
    }

    /// Run `action` while `key` is locked and has no pending operation.
    ///
    /// Returns `None` without running `action` when an operation is pending. Nothing can arm the
    /// key while `action` runs.
    pub fn if_idle<F, T>(&self, key: &EngagementKey, action: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(_) => Some(action()),
        }
    }

    /// Replace the snapshot of a pending operation with fresh server truth, or run
    /// `otherwise` while the key is still locked if nothing is pending.
    ///
    /// Returns `true` when a pending snapshot was rebased.
    pub fn rebase_or<F>(&self, key: &EngagementKey, confirmed: EngagementState, otherwise: F) -> bool
    where
        F: FnOnce(),
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().operation.snapshot = confirmed;
                true
            }
            Entry::Vacant(_) => {
                otherwise();
                false
            }
        }
    }

    /// Snapshot of the keys that currently have a pending operation.
    pub fn all_keys(&self) -> Vec<EngagementKey> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Copy of the pending operation of `key`.
    pub fn get(&self, key: &EngagementKey) -> Option<PendingOperation> {
        self.slots.get(key).map(|slot| slot.operation.clone())
    }

    /// Whether `key` has a pending operation, settling or not.
    pub fn contains(&self, key: &EngagementKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of keys with a pending operation.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no key has a pending operation.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Per-key gate serializing network calls for the same key.
    pub fn gate(&self, key: &EngagementKey) -> Arc<Mutex<()>> {
        self.gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the gate of `key` when nobody else holds or waits on it.
    pub fn release_gate(&self, key: &EngagementKey) {
        self.gates
            .remove_if(key, |_, gate| Arc::strong_count(gate) == 1);
    }

    fn new_slot(&self, key: &EngagementKey, snapshot: EngagementState) -> Slot {
        let id = Uuid::new_v4();
        let generation = 0;
        Slot {
            operation: PendingOperation {
                id,
                key: key.clone(),
                snapshot,
                scheduled_at: Instant::now(),
            },
            generation,
            timer: Some(self.spawn_timer(key, id, generation)),
            settling: false,
        }
    }

    fn spawn_timer(&self, key: &EngagementKey, id: OperationId, generation: u64) -> AbortHandle {
        let delay = self.config.debounce_for(key.target_type());
        let expiries = self.expiries.clone();
        let expiry = Expiry {
            key: key.clone(),
            id,
            generation,
        };

        tokio::spawn(async move {
            sleep(delay).await;
            let _ = expiries.send(expiry);
        })
        .abort_handle()
    }
}
