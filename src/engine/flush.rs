use futures::future::join_all;
use tracing::info;

use super::{SettleOutcome, ToggleCoordinator};

/// Tally of a [`FlushController::flush_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Writes confirmed by the server.
    pub settled: usize,
    /// Writes that failed and were rolled back.
    pub rolled_back: usize,
    /// Writes whose key was taken over by a newer operation meanwhile.
    pub superseded: usize,
    /// Operations that another settle handled first.
    pub skipped: usize,
}

impl FlushReport {
    fn record(&mut self, outcome: SettleOutcome) {
        match outcome {
            SettleOutcome::Settled(_) => self.settled += 1,
            SettleOutcome::RolledBack(_) => self.rolled_back += 1,
            SettleOutcome::Superseded { .. } => self.superseded += 1,
            SettleOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Add the counters of `other` to this report.
    pub fn merge(&mut self, other: FlushReport) {
        self.settled += other.settled;
        self.rolled_back += other.rolled_back;
        self.superseded += other.superseded;
        self.skipped += other.skipped;
    }

    /// Number of keys the flush visited.
    pub fn total(&self) -> usize {
        self.settled + self.rolled_back + self.superseded + self.skipped
    }
}

/// Forces every pending operation to settle now instead of after its debounce window.
#[derive(Clone)]
pub struct FlushController {
    coordinator: ToggleCoordinator,
}

impl FlushController {
    /// Flush controller over the pending operations of `coordinator`.
    pub fn new(coordinator: ToggleCoordinator) -> Self {
        Self { coordinator }
    }

    /// Cancel every debounce timer and settle all pending operations concurrently.
    ///
    /// Resolves once every settle finished, including settles a timer had already started.
    /// One key failing never stops the others.
    pub async fn flush_all(&self) -> FlushReport {
        let registry = self.coordinator.registry();
        if registry.is_empty() {
            return FlushReport::default();
        }

        let settles = registry.all_keys().into_iter().filter_map(|key| {
            let operation = registry.cancel_and_get(&key)?;
            Some(self.coordinator.settle(key, operation.id, None))
        });

        let mut report = FlushReport::default();
        for outcome in join_all(settles).await {
            report.record(outcome);
        }

        if report.total() > 0 {
            info!(
                settled = report.settled,
                rolled_back = report.rolled_back,
                superseded = report.superseded,
                skipped = report.skipped,
                "flushed pending engagements"
            );
        }
        report
    }
}
