use std::time::Duration;

use super::error::{HttpRemoteError, HttpResult};

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration describing how to reach the engagement API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API root including the version prefix, e.g. `https://host/api/v1`.
    pub base_url: String,
    /// Bearer token of the signed-in caller.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Construct a configuration from an explicit API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach the caller's bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> HttpResult<Self> {
        let base_url = std::env::var("ENGAGEMENT_API_BASE_URL").map_err(|_| {
            HttpRemoteError::MissingEnvVar {
                var: "ENGAGEMENT_API_BASE_URL",
            }
        })?;

        let mut config = Self::new(base_url);

        if let Some(token) = std::env::var("ENGAGEMENT_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
        {
            config = config.with_token(token);
        }

        if let Ok(raw) = std::env::var("ENGAGEMENT_API_TIMEOUT_MS") {
            let millis = raw.parse::<u64>().map_err(|_| HttpRemoteError::InvalidEnvVar {
                var: "ENGAGEMENT_API_TIMEOUT_MS",
            })?;
            config = config.with_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }
}
