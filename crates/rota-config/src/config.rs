//! Scheduler configuration (`~/.config/lead-rota/config.toml`).
//!
//! Every section and field is optional; a missing file yields the defaults:
//! a 15 minute cadence inside 09:00-18:00 UTC, at most 4 leads per agent per
//! run, and a 120 second per-tenant deadline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use rota_core::AppError;

use crate::paths;
use crate::schedule::ScheduleWindow;

const DEFAULT_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_WINDOW_START: &str = "09:00";
const DEFAULT_WINDOW_END: &str = "18:00";
const DEFAULT_UTC_OFFSET: &str = "+00:00";
const DEFAULT_MAX_BATCH_PER_AGENT: u32 = 4;
const DEFAULT_TENANT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotaConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Cadence and daily window of the schedule trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_window_start")]
    pub window_start: String,
    #[serde(default = "default_window_end")]
    pub window_end: String,
    /// Fixed offset the window is evaluated in, e.g. `+05:30`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Fire once immediately when the trigger starts.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            window_start: default_window_start(),
            window_end: default_window_end(),
            utc_offset: default_utc_offset(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Cap on leads one agent receives in a single run.
    #[serde(default = "default_max_batch_per_agent")]
    pub max_batch_per_agent: u32,
    #[serde(default = "default_tenant_timeout_secs")]
    pub tenant_timeout_secs: u64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_batch_per_agent: DEFAULT_MAX_BATCH_PER_AGENT,
            tenant_timeout_secs: DEFAULT_TENANT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_dir: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_window_start() -> String {
    DEFAULT_WINDOW_START.to_string()
}

fn default_window_end() -> String {
    DEFAULT_WINDOW_END.to_string()
}

fn default_utc_offset() -> String {
    DEFAULT_UTC_OFFSET.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_batch_per_agent() -> u32 {
    DEFAULT_MAX_BATCH_PER_AGENT
}

fn default_tenant_timeout_secs() -> u64 {
    DEFAULT_TENANT_TIMEOUT_SECS
}

impl RotaConfig {
    /// Load from an explicit path, or from the default location.
    ///
    /// An explicit path must exist. The default location falls back to
    /// `Default` when the file (or the config directory) is missing.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.interval_secs == 0 {
            return Err(invalid("schedule.interval_secs must be greater than 0"));
        }
        if self.distribution.max_batch_per_agent == 0 {
            return Err(invalid(
                "distribution.max_batch_per_agent must be greater than 0",
            ));
        }
        if self.distribution.tenant_timeout_secs == 0 {
            return Err(invalid(
                "distribution.tenant_timeout_secs must be greater than 0",
            ));
        }
        self.window()?;
        Ok(())
    }

    pub fn window(&self) -> Result<ScheduleWindow> {
        ScheduleWindow::parse(
            &self.schedule.window_start,
            &self.schedule.window_end,
            &self.schedule.utc_offset,
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    pub fn tenant_timeout(&self) -> Duration {
        Duration::from_secs(self.distribution.tenant_timeout_secs)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(paths::default_data_dir)
    }

    pub fn lease_dir(&self) -> PathBuf {
        self.storage
            .lease_dir
            .clone()
            .unwrap_or_else(paths::default_lease_dir)
    }

    /// Default config file location: `~/.config/lead-rota/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        paths::config_dir().map(|d| d.join("config.toml"))
    }

    /// Commented template written by `rota config init`.
    pub fn default_template() -> String {
        r#"# Lead Rota configuration
# Location: ~/.config/lead-rota/config.toml

[schedule]
interval_secs = 900        # Cadence between scheduled firings
window_start = "09:00"     # Firings outside [window_start, window_end) are suppressed
window_end = "18:00"
utc_offset = "+00:00"      # Fixed offset the window is evaluated in
run_on_start = true        # Fire once immediately at startup

[distribution]
max_batch_per_agent = 4    # Most leads one agent receives per run
tenant_timeout_secs = 120  # Deadline for one tenant's run

[storage]
# data_dir = "/var/lib/lead-rota"
# lease_dir = "/var/lib/lead-rota/leases"
"#
        .to_string()
    }

    /// Write the template, creating parent directories. Refuses to overwrite.
    pub fn save_default_template(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

fn invalid(msg: &str) -> anyhow::Error {
    AppError::InvalidConfig(msg.to_string()).into()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
