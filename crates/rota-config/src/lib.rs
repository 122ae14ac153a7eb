//! Scheduler configuration loading and validation (`~/.config/lead-rota/config.toml`).

pub mod config;
pub mod paths;
pub mod schedule;

pub use config::{DistributionConfig, RotaConfig, ScheduleConfig, StorageConfig};
pub use schedule::{ScheduleWindow, parse_utc_offset};
