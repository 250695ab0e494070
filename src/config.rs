//! Engine configuration loading: debounce windows per engagement domain.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::TargetType;

/// Default location on disk where the engine looks for its JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/engagement.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ENGAGEMENT_SYNC_CONFIG_PATH";
/// Debounce window applied to post and reply likes.
pub const DEFAULT_LIKE_DEBOUNCE: Duration = Duration::from_millis(5_000);
/// Debounce window applied to saved-list membership.
pub const DEFAULT_LIST_DEBOUNCE: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable engine configuration shared by the coordinator and its registry.
pub struct SyncConfig {
    like_debounce: Duration,
    list_debounce: Duration,
}

impl SyncConfig {
    /// Load the configuration from disk, falling back to the built-in windows.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from an explicit path, falling back to defaults on any failure.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        like_debounce_ms = config.like_debounce.as_millis() as u64,
                        list_debounce_ms = config.list_debounce.as_millis() as u64,
                        "loaded engagement sync config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Override the like debounce window.
    pub fn with_like_debounce(mut self, window: Duration) -> Self {
        self.like_debounce = window;
        self
    }

    /// Override the list membership debounce window.
    pub fn with_list_debounce(mut self, window: Duration) -> Self {
        self.list_debounce = window;
        self
    }

    /// Delay between the last toggle on a key and its network write.
    pub fn debounce_for(&self, target: TargetType) -> Duration {
        match target {
            TargetType::Post | TargetType::Reply => self.like_debounce,
            TargetType::ListPlace => self.list_debounce,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            like_debounce: DEFAULT_LIKE_DEBOUNCE,
            list_debounce: DEFAULT_LIST_DEBOUNCE,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    like_debounce_ms: Option<u64>,
    #[serde(default)]
    list_debounce_ms: Option<u64>,
}

impl From<RawConfig> for SyncConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            like_debounce: value
                .like_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.like_debounce),
            list_debounce: value
                .list_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.list_debounce),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
