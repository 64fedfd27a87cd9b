//! Rejoin settings.
//!
//! Optionally loaded from `~/.config/freeq/rejoin.toml`:
//!
//! ```toml
//! interval_secs = 300
//! channel_prefixes = "#&!+"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::DEFAULT_CHANNEL_PREFIXES;
use crate::error::RejoinError;

/// Retry every five minutes.
pub const DEFAULT_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejoinConfig {
    /// Seconds between rejoin passes. Must be non-zero.
    pub interval_secs: u64,
    /// Characters that start a channel name.
    pub channel_prefixes: String,
}

impl Default for RejoinConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            channel_prefixes: DEFAULT_CHANNEL_PREFIXES.to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("freeq")
        .join("rejoin.toml")
}

impl RejoinConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), RejoinError> {
        if self.interval_secs == 0 {
            return Err(RejoinError::Config("interval_secs must be non-zero".into()));
        }
        if self.channel_prefixes.is_empty() {
            return Err(RejoinError::Config("channel_prefixes must not be empty".into()));
        }
        Ok(())
    }

    pub fn from_toml(s: &str) -> Result<Self, RejoinError> {
        let config: Self = toml::from_str(s).map_err(|e| RejoinError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when the file doesn't exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("can't read {}: {e}", path.display()))?;
        let config = Self::from_toml(&s)
            .map_err(|e| anyhow::anyhow!("bad config file {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }
}
