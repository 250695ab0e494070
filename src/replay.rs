//! Scripted toggle sessions replayed by the `engagement-sync` binary.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use crate::engine::{
    EngagementKey, EngagementState, FlushReport, SeedMode, ToggleOutcome, ViewScope,
};

/// Failures while loading a replay script.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The script file could not be read.
    #[error("failed to read replay script `{path}`")]
    Read {
        /// Script location.
        path: String,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The script is not valid JSON for [`ReplayScript`].
    #[error("failed to parse replay script `{path}`")]
    Parse {
        /// Script location.
        path: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
}

/// A view session: initial context, the states it loaded, then user actions.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayScript {
    /// Label of the entity the view opens on.
    pub context: String,
    /// States loaded when the view opens.
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
    /// User actions, in order.
    pub steps: Vec<ReplayStep>,
}

/// Server-reported state of one key, as a list or detail fetch would return it.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Key being loaded.
    pub key: EngagementKey,
    /// Count reported by the server.
    pub count: u64,
    /// Caller flag reported by the server.
    pub engaged: bool,
}

/// One user action in a replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStep {
    /// User taps the like / save control.
    Toggle(EngagementKey),
    /// Idle time between actions.
    WaitMs(u64),
    /// Navigate the view to another entity and load its states.
    Navigate {
        /// Label of the new entity.
        context: String,
        /// States loaded for the new entity.
        #[serde(default)]
        seed: Vec<SeedEntry>,
    },
    /// Force pending writes out without leaving the view.
    Flush,
}

/// Counters gathered while replaying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Toggles that changed local state.
    pub toggles_applied: usize,
    /// Toggles ignored (signed out, or key not loaded).
    pub toggles_ignored: usize,
    /// Flush outcomes summed over every navigation and explicit flush.
    pub flushed: FlushReport,
}

impl ReplayScript {
    /// Read and parse a script from `path`.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let contents = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ReplayError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Seed the initial context and play every step against `scope`.
    ///
    /// Does not unmount the scope; the caller decides when the view goes away.
    pub async fn play(&self, scope: &mut ViewScope) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        seed_all(scope, &self.seed);

        for step in &self.steps {
            match step {
                ReplayStep::Toggle(key) => match scope.toggle(key) {
                    ToggleOutcome::Applied { state, .. } => {
                        info!(key = %key, count = state.count, engaged = state.engaged, "toggled");
                        summary.toggles_applied += 1;
                    }
                    ToggleOutcome::Unauthenticated | ToggleOutcome::NotLoaded => {
                        summary.toggles_ignored += 1;
                    }
                },
                ReplayStep::WaitMs(millis) => sleep(Duration::from_millis(*millis)).await,
                ReplayStep::Navigate { context, seed } => {
                    let report = scope.on_target_change(context.clone()).await;
                    summary.flushed.merge(report);
                    seed_all(scope, seed);
                }
                ReplayStep::Flush => {
                    let report = scope.flush().await;
                    summary.flushed.merge(report);
                }
            }
        }

        summary
    }
}

fn seed_all(scope: &ViewScope, entries: &[SeedEntry]) {
    for entry in entries {
        scope.seed(
            entry.key.clone(),
            EngagementState::new(entry.count, entry.engaged),
            SeedMode::Reload,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_kind() {
        let script: ReplayScript = serde_json::from_str(
            r#"{
                "context": "post:p1",
                "seed": [{"key": {"type": "post", "post_id": "p1"}, "count": 3, "engaged": false}],
                "steps": [
                    {"toggle": {"type": "reply", "post_id": "p1", "reply_id": "r1"}},
                    {"wait_ms": 250},
                    {"navigate": {"context": "post:p2"}},
                    "flush"
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.seed.len(), 1);
        assert!(matches!(&script.steps[0], ReplayStep::Toggle(key) if *key == EngagementKey::reply("p1", "r1")));
        assert!(matches!(script.steps[1], ReplayStep::WaitMs(250)));
        assert!(matches!(&script.steps[2], ReplayStep::Navigate { context, seed } if context == "post:p2" && seed.is_empty()));
        assert!(matches!(script.steps[3], ReplayStep::Flush));
    }
}
