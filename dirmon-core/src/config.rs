//! src/config.rs
//! ============================================================================
//! # Config: engine configuration loader and saver
//!
//! Loads and saves settings as TOML from the platform config path using the
//! [`directories`](https://docs.rs/directories) crate. Every section has a
//! sensible default so a missing or partial file is never fatal.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! let registry = DirectoryRegistry::with_config(config.clone());
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use tokio::fs as TokioFs;

use crate::logging::LoggerConfig;

/// Backoff policy for transient backend failures (busy, interrupted, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Growth factor applied after every failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(800),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all, useful for tests.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay to wait before attempt number `attempt` (1-based; the first
    /// attempt never waits).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);

        // Large attempt counts overflow the factor; those sit at the cap anyway
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

/// Directory engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra delay before a batched notification flush. Zero means "next tick".
    #[serde(with = "humantime_serde")]
    pub notify_delay: Duration,

    /// Maximum number of concurrent `stat` calls per directory.
    pub stat_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notify_delay: Duration::ZERO,
            stat_concurrency: 8,
        }
    }
}

/// Filesystem watching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,

    /// Skip native notifications and poll straight away (network shares).
    pub force_polling: bool,

    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_polling: false,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Bundled search engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits are delivered in batches of at most this many URIs.
    pub batch_size: usize,

    /// Depth limit for the walk below the query location.
    pub max_depth: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_depth: None,
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggerConfig,
}

impl Config {
    /// Loads config from the platform config dir, or returns defaults.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/dirmon/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            info!("Loading config from {}", path.display());

            let text = TokioFs::read_to_string(&path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration",
                path.display()
            );

            Ok(Self::default())
        }
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "dirmon", "dirmon")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;

        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_for(1), Duration::ZERO);
        assert_eq!(policy.backoff_for(2), Duration::from_millis(25));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(20), policy.max_backoff);
        assert_eq!(policy.backoff_for(200), policy.max_backoff);
        assert_eq!(policy.backoff_for(u32::MAX), policy.max_backoff);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [retry]
            max_attempts = 7

            [watch]
            poll_interval = "500ms"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.retry.max_attempts, 7);
        assert_eq!(cfg.retry.multiplier, 2.0);
        assert_eq!(cfg.watch.poll_interval, Duration::from_millis(500));
        assert!(cfg.watch.enabled);
        assert_eq!(cfg.search.batch_size, 500);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        assert_eq!(back.engine, cfg.engine);
        assert_eq!(back.retry, cfg.retry);
    }
}
