use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{config::SyncConfig, error::EngineError, remote::RemoteSync};

use super::{
    EngagementKey, EngagementState, EngagementStore, SeedMode,
    registry::{Armed, Expiry, OperationId, PendingOperation, PendingOperationRegistry, Retirement},
};

/// Status of a [`ToggleCoordinator::toggle`] call. Never an error: failures of the deferred
/// network write are handled by rolling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The optimistic change was applied and a network write is scheduled.
    Applied {
        /// Local state after the toggle.
        state: EngagementState,
        /// How the pending operation was armed.
        armed: Armed,
    },
    /// The caller is not signed in; nothing happened.
    Unauthenticated,
    /// No state is loaded for the key; nothing happened.
    NotLoaded,
}

/// How a settle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The server answered and the local state now mirrors it.
    Settled(EngagementState),
    /// The write failed and the local state was restored to the snapshot.
    RolledBack(EngagementState),
    /// A newer operation took over the key; only its snapshot was updated.
    Superseded {
        /// Whether the superseded write itself went through.
        succeeded: bool,
    },
    /// The operation was already settled, cancelled or replaced before this settle claimed it.
    Skipped,
}

/// Applies toggles optimistically and coalesces them into one debounced write per key.
///
/// Cheap to clone; all clones drive the same store and registry. Construction spawns the task
/// that turns timer expiries into settles, so it must happen inside a Tokio runtime.
#[derive(Clone)]
pub struct ToggleCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: EngagementStore,
    registry: PendingOperationRegistry,
    remote: Arc<dyn RemoteSync>,
    authenticated: watch::Sender<bool>,
}

impl ToggleCoordinator {
    /// Build a coordinator writing through `remote`. Starts unauthenticated.
    pub fn new(remote: Arc<dyn RemoteSync>, config: SyncConfig) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let (authenticated, _rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            store: EngagementStore::new(),
            registry: PendingOperationRegistry::new(config, expiry_tx),
            remote,
            authenticated,
        });

        tokio::spawn(dispatch_expiries(Arc::downgrade(&inner), expiry_rx));
        Self { inner }
    }

    /// Flip the caller's engagement on `key` locally and (re)arm its debounced write.
    ///
    /// Synchronous: the store is updated before this returns.
    pub fn toggle(&self, key: &EngagementKey) -> ToggleOutcome {
        if !self.is_authenticated() {
            debug!(key = %key, "toggle ignored: caller is not authenticated");
            return ToggleOutcome::Unauthenticated;
        }

        let store = &self.inner.store;
        let mut applied = None;
        let armed = self.inner.registry.arm(key, || {
            let (before, after) = store.mutate(key, EngagementState::toggled)?;
            applied = Some(after);
            Some(before)
        });

        match (armed, applied) {
            (Some(armed), Some(state)) => {
                debug!(
                    key = %key,
                    id = %armed.id(),
                    count = state.count,
                    engaged = state.engaged,
                    "toggle applied"
                );
                ToggleOutcome::Applied { state, armed }
            }
            _ => {
                warn!(key = %key, "toggle ignored: engagement not loaded");
                ToggleOutcome::NotLoaded
            }
        }
    }

    /// Install server-reported state for `key`.
    ///
    /// A reload of a key with a pending operation keeps the optimistic local value and only
    /// refreshes the operation's snapshot.
    pub fn seed(&self, key: EngagementKey, state: EngagementState, mode: SeedMode) -> bool {
        match mode {
            SeedMode::IfAbsent => self.inner.store.seed(key, state, mode),
            SeedMode::Reload => {
                let store = &self.inner.store;
                let mut seeded = false;
                let rebased = self.inner.registry.rebase_or(&key, state, || {
                    seeded = store.seed(key.clone(), state, mode);
                });
                if rebased {
                    debug!(key = %key, "reload rebased pending snapshot");
                }
                rebased || seeded
            }
        }
    }

    /// Discard the state of `key`. Refused while a write is pending for it.
    pub fn evict(&self, key: &EngagementKey) -> Result<EngagementState, EngineError> {
        let store = &self.inner.store;
        match self.inner.registry.if_idle(key, || store.remove(key)) {
            Some(Some(state)) => Ok(state),
            Some(None) => Err(EngineError::NotLoaded(key.clone())),
            None => Err(EngineError::PendingOperation(key.clone())),
        }
    }

    /// Current local state for display.
    pub fn state(&self, key: &EngagementKey) -> Option<EngagementState> {
        self.inner.store.get(key)
    }

    /// The pending operation of `key`, if a write is scheduled or in flight.
    pub fn pending(&self, key: &EngagementKey) -> Option<PendingOperation> {
        self.inner.registry.get(key)
    }

    /// Whether a write is scheduled or in flight for `key`.
    pub fn is_pending(&self, key: &EngagementKey) -> bool {
        self.inner.registry.contains(key)
    }

    /// Number of keys with a pending operation.
    pub fn pending_len(&self) -> usize {
        self.inner.registry.len()
    }

    /// Record whether a caller is signed in. Toggles are ignored while signed out.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.inner.authenticated.send_replace(authenticated);
    }

    /// Whether toggles are currently accepted.
    pub fn is_authenticated(&self) -> bool {
        *self.inner.authenticated.borrow()
    }

    /// Subscribe to authentication changes.
    pub fn authentication_watcher(&self) -> watch::Receiver<bool> {
        self.inner.authenticated.subscribe()
    }

    pub(crate) fn registry(&self) -> &PendingOperationRegistry {
        &self.inner.registry
    }

    /// Send the current state of operation `id` to the server and reconcile.
    ///
    /// Shared by timer expiry (`generation` set) and flushes (`generation` unset). Settles on
    /// the same key run one at a time.
    pub(crate) async fn settle(
        &self,
        key: EngagementKey,
        id: OperationId,
        generation: Option<u64>,
    ) -> SettleOutcome {
        let registry = &self.inner.registry;
        let gate = registry.gate(&key);
        let guard = gate.lock().await;

        let outcome = self.settle_exclusive(&key, id, generation).await;

        drop(guard);
        drop(gate);
        registry.release_gate(&key);
        outcome
    }

    async fn settle_exclusive(
        &self,
        key: &EngagementKey,
        id: OperationId,
        generation: Option<u64>,
    ) -> SettleOutcome {
        let Inner {
            store,
            registry,
            remote,
            ..
        } = &*self.inner;

        let Some(operation) = registry.claim(key, id, generation) else {
            return SettleOutcome::Skipped;
        };
        let Some(desired) = store.get(key) else {
            registry.retire(key, id, operation.snapshot, || {});
            warn!(key = %key, %id, "engagement evicted before settle; dropping write");
            return SettleOutcome::Skipped;
        };

        debug!(key = %key, %id, engaged = desired.engaged, "settling pending operation");
        match remote.push(key, desired).await {
            Ok(confirmed) => {
                match registry.retire(key, id, confirmed, || {
                    store.overwrite(key, confirmed);
                }) {
                    Retirement::Superseded { successor } => {
                        debug!(key = %key, %id, %successor, "settle superseded; successor rebased");
                        SettleOutcome::Superseded { succeeded: true }
                    }
                    Retirement::Retired | Retirement::Missing => {
                        info!(
                            key = %key,
                            %id,
                            count = confirmed.count,
                            engaged = confirmed.engaged,
                            "engagement synced"
                        );
                        SettleOutcome::Settled(confirmed)
                    }
                }
            }
            Err(err) => {
                let snapshot = operation.snapshot;
                match registry.retire(key, id, snapshot, || {
                    store.overwrite(key, snapshot);
                }) {
                    Retirement::Superseded { successor } => {
                        warn!(
                            key = %key,
                            %id,
                            %successor,
                            error = %err,
                            "engagement sync failed; successor keeps snapshot"
                        );
                        SettleOutcome::Superseded { succeeded: false }
                    }
                    Retirement::Retired | Retirement::Missing => {
                        warn!(
                            key = %key,
                            %id,
                            error = %err,
                            count = snapshot.count,
                            engaged = snapshot.engaged,
                            "engagement sync failed; rolled back"
                        );
                        SettleOutcome::RolledBack(snapshot)
                    }
                }
            }
        }
    }
}

/// Turn timer expiries into settles until the coordinator is dropped.
async fn dispatch_expiries(inner: Weak<Inner>, mut expiries: mpsc::UnboundedReceiver<Expiry>) {
    while let Some(Expiry { key, id, generation }) = expiries.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = ToggleCoordinator { inner };
        tokio::spawn(async move {
            coordinator.settle(key, id, Some(generation)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::sync::Mutex;

    use super::*;
    use crate::remote::{NetworkError, RemoteResult};

    /// Remote that answers from a script and records every call.
    #[derive(Default)]
    struct ScriptedRemote {
        calls: Mutex<Vec<(EngagementKey, EngagementState)>>,
        answers: Mutex<Vec<RemoteResult<EngagementState>>>,
    }

    impl ScriptedRemote {
        fn answering(answers: Vec<RemoteResult<EngagementState>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                answers: Mutex::new(answers),
            })
        }
    }

    impl RemoteSync for Arc<ScriptedRemote> {
        fn push(
            &self,
            key: &EngagementKey,
            desired: EngagementState,
        ) -> BoxFuture<'static, RemoteResult<EngagementState>> {
            let this = self.clone();
            let key = key.clone();
            Box::pin(async move {
                this.calls.lock().await.push((key, desired));
                let mut answers = this.answers.lock().await;
                if answers.is_empty() {
                    Ok(desired)
                } else {
                    answers.remove(0)
                }
            })
        }
    }

    fn coordinator(remote: &Arc<ScriptedRemote>) -> ToggleCoordinator {
        let coordinator = ToggleCoordinator::new(Arc::new(remote.clone()), SyncConfig::default());
        coordinator.set_authenticated(true);
        coordinator
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_toggle_is_a_no_op() {
        let remote = ScriptedRemote::answering(vec![]);
        let coordinator = coordinator(&remote);
        coordinator.set_authenticated(false);
        let key = EngagementKey::post("p1");
        coordinator.seed(key.clone(), EngagementState::new(4, false), SeedMode::IfAbsent);

        assert_eq!(coordinator.toggle(&key), ToggleOutcome::Unauthenticated);
        assert_eq!(coordinator.state(&key), Some(EngagementState::new(4, false)));
        assert!(!coordinator.is_pending(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_on_unloaded_key_is_a_no_op() {
        let remote = ScriptedRemote::answering(vec![]);
        let coordinator = coordinator(&remote);

        assert_eq!(
            coordinator.toggle(&EngagementKey::post("missing")),
            ToggleOutcome::NotLoaded
        );
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_with_pending_operation_rebases_snapshot() {
        let remote = ScriptedRemote::answering(vec![Err(NetworkError::rejected("boom"))]);
        let coordinator = coordinator(&remote);
        let key = EngagementKey::post("p1");
        coordinator.seed(key.clone(), EngagementState::new(10, false), SeedMode::IfAbsent);

        coordinator.toggle(&key);
        assert!(coordinator.seed(key.clone(), EngagementState::new(12, false), SeedMode::Reload));
        assert_eq!(coordinator.state(&key), Some(EngagementState::new(11, true)));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(coordinator.state(&key), Some(EngagementState::new(12, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn evict_is_refused_while_pending() {
        let remote = ScriptedRemote::answering(vec![]);
        let coordinator = coordinator(&remote);
        let key = EngagementKey::post("p1");
        coordinator.seed(key.clone(), EngagementState::new(1, false), SeedMode::IfAbsent);
        coordinator.toggle(&key);

        assert_eq!(
            coordinator.evict(&key),
            Err(EngineError::PendingOperation(key.clone()))
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(coordinator.evict(&key), Ok(EngagementState::new(2, true)));
        assert_eq!(coordinator.evict(&key), Err(EngineError::NotLoaded(key)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn evict_never_discards_a_concurrent_toggle() {
        let remote = ScriptedRemote::answering(vec![]);
        let coordinator = coordinator(&remote);

        for round in 0..200 {
            let key = EngagementKey::post(format!("p{round}"));
            coordinator.seed(key.clone(), EngagementState::new(1, false), SeedMode::IfAbsent);

            let (toggler, evicter) = (coordinator.clone(), coordinator.clone());
            let (toggle_key, evict_key) = (key.clone(), key.clone());
            let toggle = tokio::spawn(async move { toggler.toggle(&toggle_key) });
            let evict = tokio::spawn(async move { evicter.evict(&evict_key) });
            let (toggled, evicted) = (toggle.await.unwrap(), evict.await.unwrap());

            // Either the eviction won and the toggle found nothing, or the toggle armed
            // first and the eviction was refused.
            match toggled {
                ToggleOutcome::Applied { .. } => {
                    assert_eq!(evicted, Err(EngineError::PendingOperation(key.clone())));
                    assert!(coordinator.state(&key).is_some());
                }
                other => {
                    assert_eq!(other, ToggleOutcome::NotLoaded);
                    assert_eq!(evicted, Ok(EngagementState::new(1, false)));
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_failure_does_not_clobber_successor() {
        let remote = ScriptedRemote::answering(vec![]);
        let coordinator = coordinator(&remote);
        let key = EngagementKey::post("p1");
        coordinator.seed(key.clone(), EngagementState::new(10, false), SeedMode::IfAbsent);

        let ToggleOutcome::Applied { armed, .. } = coordinator.toggle(&key) else {
            panic!("toggle should apply");
        };
        let first = coordinator.registry().claim(&key, armed.id(), None).unwrap();

        // A toggle while the first write is in flight starts a successor.
        let ToggleOutcome::Applied { state, armed } = coordinator.toggle(&key) else {
            panic!("toggle should apply");
        };
        assert!(matches!(armed, Armed::Superseding { .. }));
        assert_eq!(state, EngagementState::new(10, false));

        // The first write fails after the successor was armed.
        coordinator.registry().cancel_and_get(&key);
        let successor = coordinator.pending(&key).unwrap();
        assert_ne!(successor.id, first.id);
        let outcome = coordinator
            .registry()
            .retire(&key, first.id, first.snapshot, || panic!("must not reconcile"));
        assert_eq!(outcome, Retirement::Superseded { successor: successor.id });
        assert_eq!(coordinator.state(&key), Some(EngagementState::new(10, false)));
        assert_eq!(
            coordinator.pending(&key).unwrap().snapshot,
            EngagementState::new(10, false)
        );
    }
}
