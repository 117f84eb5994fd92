//! Tracker configuration from the environment or a JSON file.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::time::Duration;

use crate::reconciler::{DEFAULT_ANIMATION, ReconcileOptions};

pub const DEFAULT_BASE_URL: &str = "https://osushuttles.com";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Settings shared by every CLI command.
///
/// As a JSON file:
/// ```json
/// {
///   "base_url": "https://osushuttles.com",
///   "api_key": "…",
///   "poll_interval_ms": 1000,
///   "animation_ms": 1000,
///   "evict_after_missed_polls": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub poll_interval_ms: u64,
    pub animation_ms: u64,
    pub evict_after_missed_polls: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            animation_ms: DEFAULT_ANIMATION.as_millis() as u64,
            evict_after_missed_polls: None,
        }
    }
}

impl TrackerConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config '{path}'"))?;
        config
            .validate()
            .with_context(|| format!("invalid config '{path}'"))?;
        Ok(config)
    }

    /// Builds a config from `SHUTTLE_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("SHUTTLE_BASE_URL") {
            config.base_url = url;
        }
        config.api_key = lookup("SHUTTLE_API_KEY").filter(|k| !k.is_empty());
        if let Some(ms) = lookup("SHUTTLE_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_var("SHUTTLE_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("SHUTTLE_ANIMATION_MS") {
            config.animation_ms = parse_var("SHUTTLE_ANIMATION_MS", &ms)?;
        }
        if let Some(n) = lookup("SHUTTLE_EVICT_AFTER") {
            config.evict_after_missed_polls = Some(parse_var("SHUTTLE_EVICT_AFTER", &n)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the poller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("SHUTTLE_POLL_INTERVAL_MS (poll_interval_ms) must be greater than 0"));
        }
        if self.evict_after_missed_polls == Some(0) {
            return Err(anyhow!("SHUTTLE_EVICT_AFTER (evict_after_missed_polls) must be at least 1"));
        }
        Ok(())
    }

    /// Returns the API key or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("SHUTTLE_API_KEY must be set (or pass --api-key)"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            animation: Duration::from_millis(self.animation_ms),
            evict_after_missed_polls: self.evict_after_missed_polls,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("{name} has invalid value '{value}': {e}"))
}
