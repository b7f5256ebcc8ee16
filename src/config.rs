//! Profiler configuration.
//!
//! Every bound the engine applies (Top-N sizes, cache capacities, the
//! retention window) is injected here. Files may be YAML, JSON or TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ProfilerError, Result};
use crate::ranking::TopN;

pub const DEFAULT_TOP_N_STATS_PER_CATEGORY: usize = 10;
pub const DEFAULT_TOP_N_STATS_PER_SUBCATEGORY: usize = 5;
pub const DEFAULT_MAX_USER_SWITCH_EVENTS: usize = 3;
pub const DEFAULT_PERIODIC_COLLECTION_BUFFER_SIZE: usize = 180;
pub const DEFAULT_SYSTEM_EVENT_DATA_CACHE_DURATION_SECS: u64 = 3600;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9216;
const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 60;

/// Default config file locations, searched in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/perf-profiler.yaml",
    "/etc/herakles/perf-profiler.yml",
    "/etc/herakles/perf-profiler.json",
    "./herakles-perf-profiler.yaml",
    "./herakles-perf-profiler.yml",
    "./herakles-perf-profiler.json",
];

/// Sampling interval of each collection kind, reported with the proto dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionIntervals {
    pub boottime_interval_millis: u64,
    pub periodic_interval_millis: u64,
    pub user_switch_interval_millis: u64,
    pub wake_up_interval_millis: u64,
    pub custom_interval_millis: u64,
}

impl Default for CollectionIntervals {
    fn default() -> Self {
        Self {
            boottime_interval_millis: 1_000,
            periodic_interval_millis: 60_000,
            user_switch_interval_millis: 2_000,
            wake_up_interval_millis: 2_000,
            custom_interval_millis: 10_000,
        }
    }
}

/// Configuration of the profiler and the binary hosting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    // Ranking
    #[serde(alias = "top-n-stats-per-category")]
    pub top_n_stats_per_category: usize,
    #[serde(alias = "top-n-stats-per-subcategory")]
    pub top_n_stats_per_subcategory: usize,

    // Caches
    #[serde(alias = "max-user-switch-events")]
    pub max_user_switch_events: usize,
    #[serde(alias = "periodic-collection-buffer-size")]
    pub periodic_collection_buffer_size: usize,
    /// Retention window of boot-time, wake-up and user-switch records.
    #[serde(alias = "system-event-data-cache-duration-secs")]
    pub system_event_data_cache_duration_secs: u64,

    // Resource usage mirroring
    #[serde(alias = "sync-resource-usage-stats")]
    pub sync_resource_usage_stats: bool,

    // Server
    pub bind: String,
    pub port: u16,
    pub sample_interval_secs: u64,

    // Logging
    pub log_level: String,

    // Kept last so TOML output emits it as a trailing table.
    pub collection_intervals: CollectionIntervals,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            top_n_stats_per_category: DEFAULT_TOP_N_STATS_PER_CATEGORY,
            top_n_stats_per_subcategory: DEFAULT_TOP_N_STATS_PER_SUBCATEGORY,
            max_user_switch_events: DEFAULT_MAX_USER_SWITCH_EVENTS,
            periodic_collection_buffer_size: DEFAULT_PERIODIC_COLLECTION_BUFFER_SIZE,
            system_event_data_cache_duration_secs: DEFAULT_SYSTEM_EVENT_DATA_CACHE_DURATION_SECS,
            sync_resource_usage_stats: false,
            bind: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            log_level: "info".into(),
            collection_intervals: CollectionIntervals::default(),
        }
    }
}

impl ProfilerConfig {
    /// Rejects bounds the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.top_n_stats_per_category == 0 {
            return Err(ProfilerError::InvalidConfig(
                "top_n_stats_per_category must be greater than 0".into(),
            ));
        }
        if self.top_n_stats_per_subcategory == 0 {
            return Err(ProfilerError::InvalidConfig(
                "top_n_stats_per_subcategory must be greater than 0".into(),
            ));
        }
        if self.max_user_switch_events == 0 {
            return Err(ProfilerError::InvalidConfig(
                "max_user_switch_events must be greater than 0".into(),
            ));
        }
        if self.periodic_collection_buffer_size == 0 {
            return Err(ProfilerError::InvalidConfig(
                "periodic_collection_buffer_size must be greater than 0".into(),
            ));
        }
        if self.system_event_data_cache_duration_secs == 0 {
            return Err(ProfilerError::InvalidConfig(
                "system_event_data_cache_duration_secs must be greater than 0".into(),
            ));
        }
        if self.sample_interval_secs == 0 {
            return Err(ProfilerError::InvalidConfig(
                "sample_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn top_n(&self) -> TopN {
        TopN {
            per_category: self.top_n_stats_per_category,
            per_subcategory: self.top_n_stats_per_subcategory,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.system_event_data_cache_duration_secs)
    }
}

/// Loads the configuration from `path`, or from the first default location
/// that exists. Falls back to defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<ProfilerConfig> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ProfilerError::ConfigLoad(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => {
                debug!("No configuration file found, using defaults");
                return Ok(ProfilerConfig::default());
            }
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| ProfilerError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

fn parse_config(path: &Path, content: &str) -> Result<ProfilerConfig> {
    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
        Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
        // Default to YAML
        _ => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| ProfilerError::ConfigLoad(format!("{}: {}", path.display(), e)))
}
