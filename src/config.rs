use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::duration::CalendarUnit;

pub const CONFIG_FILE: &str = "config.json";

/// Settings stored in `.commentql/config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window used by `lastCommentator(..., author)`.
    pub author_lookback_days: i64,
    /// Unit applied to `lastCommented` durations written without a letter.
    pub default_duration_unit: CalendarUnit,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            author_lookback_days: 10,
            default_duration_unit: CalendarUnit::Day,
        }
    }
}

impl Config {
    /// Load from `dir/config.json`, falling back to defaults when absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        if config.author_lookback_days < 0 {
            bail!(
                "Invalid config in {}: author_lookback_days must not be negative (got {})",
                path.display(),
                config.author_lookback_days
            );
        }
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
