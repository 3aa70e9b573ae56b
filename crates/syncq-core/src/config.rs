use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{BackoffStrategy, RetryPolicy};
use crate::selection::QualityPreference;

/// Backoff between retry attempts (optional `[backoff]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// "fixed" or "exponential".
    #[serde(default)]
    pub strategy: BackoffStrategy,
    /// Fixed delay, or first delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap for exponential backoff, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl BackoffConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            strategy: self.strategy,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Defaults for the download handler (optional `[download]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Used when a download job's payload does not carry `quality`.
    #[serde(default)]
    pub quality: QualityPreference,
    /// Search timeout handed to the search client.
    pub search_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: QualityPreference::Best,
            search_timeout_secs: 15,
        }
    }
}

/// Global configuration loaded from `~/.config/syncq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker slots (the only concurrency knob).
    pub workers: usize,
    /// `max_retries` for jobs enqueued without an explicit value.
    pub default_max_retries: u32,
    /// Optional backoff section; if missing, built-in defaults are used.
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
    /// Optional download handler defaults.
    #[serde(default)]
    pub download: Option<DownloadConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            default_max_retries: 3,
            backoff: None,
            download: None,
        }
    }
}

impl EngineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.backoff
            .as_ref()
            .map(BackoffConfig::to_policy)
            .unwrap_or_default()
    }

    pub fn download(&self) -> DownloadConfig {
        self.download.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("syncq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<EngineConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
