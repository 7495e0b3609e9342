//! Sync policy and remote endpoint configuration.

use std::time::Duration;

use crate::util::{is_http_url, normalize_text_option};

/// Tunable policy knobs for the sync engine and trigger layer.
///
/// The defaults match the shipped product behavior; deployments with
/// different retry patience override them through the builder setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Dispatch attempts before a queue item is abandoned.
    pub max_attempts: u32,
    /// Delay after an offline-to-online transition before draining, so a
    /// flapping connection does not fire a drain per flap.
    pub debounce: Duration,
    /// Cadence for refreshing displayed pending/conflict counts. Never
    /// forces a drain.
    pub poll_interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl SyncPolicy {
    /// Set the dispatch attempt ceiling.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the reconnect debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the count-refresh polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Remote API endpoint plus bearer credential.
///
/// The credential is supplied by an external auth collaborator; lotbook
/// never stores or refreshes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub auth_token: String,
}

impl RemoteConfig {
    /// Create a config, validating and normalizing the base URL.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> crate::Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into())).ok_or_else(|| {
            crate::Error::InvalidInput("API base URL must not be empty".into())
        })?;
        if !is_http_url(&base_url) {
            return Err(crate::Error::InvalidInput(
                "API base URL must include http:// or https://".into(),
            ));
        }

        let auth_token = auth_token.into().trim().to_string();
        if auth_token.is_empty() {
            return Err(crate::Error::InvalidInput(
                "API auth token must not be empty".into(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }
}
