//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for one engine run. Loaded from an optional TOML file and
/// overridden field-by-field from the CLI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum duration (in seconds) for one source invocation: a full tool
    /// run, or a single API attempt (not the whole retry budget).
    #[serde(default = "EngineConfig::default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,
    /// TCP connect ceiling (in seconds) for API requests.
    #[serde(default = "EngineConfig::default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    /// Additional attempts after a failed API attempt. Tools never retry.
    #[serde(default = "EngineConfig::default_retries")]
    pub retries: u32,
    /// Base delay (in milliseconds) for the exponential retry backoff; the
    /// sleep before attempt `k + 1` is `base * 2^k`.
    #[serde(default = "EngineConfig::default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Overall per-target ceiling in seconds. Zero disables it.
    #[serde(default)]
    pub target_timeout_seconds: u64,
    /// User agent presented to API sources.
    #[serde(default = "EngineConfig::default_user_agent")]
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_timeout_seconds: Self::default_task_timeout_seconds(),
            connect_timeout_seconds: Self::default_connect_timeout_seconds(),
            retries: Self::default_retries(),
            backoff_base_ms: Self::default_backoff_base_ms(),
            target_timeout_seconds: 0,
            user_agent: Self::default_user_agent(),
        }
    }
}

impl EngineConfig {
    const fn default_task_timeout_seconds() -> u64 {
        90
    }

    const fn default_connect_timeout_seconds() -> u64 {
        5
    }

    const fn default_retries() -> u32 {
        3
    }

    const fn default_backoff_base_ms() -> u64 {
        1_000
    }

    fn default_user_agent() -> String {
        format!("subrecon/{}", crate::ENGINE_VERSION)
    }

    /// Reads a config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Loads an explicit config file, or `subrecon.toml` from the working
    /// directory when present, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let implicit = Path::new("subrecon.toml");
        if implicit.exists() {
            return Self::from_file(implicit);
        }
        Ok(Self::default())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// The per-target ceiling, `None` when disabled.
    pub fn target_timeout(&self) -> Option<Duration> {
        (self.target_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.target_timeout_seconds))
    }
}
