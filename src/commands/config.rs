//! Config command implementation.
//!
//! Writes a default configuration file and prints the effective one.

use herakles_perf_profiler::ProfilerConfig;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Serializes `config` in the requested format.
pub fn render_config(
    config: &ProfilerConfig,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(content)
}

/// Prints the effective merged configuration.
pub fn show_config(
    config: &ProfilerConfig,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

/// Generates a configuration file with default values.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ProfilerConfig::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-perf-profiler.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Performance Profiler Configuration
# ============================================
#
# Ranking
# -------
# top_n_stats_per_category: 10        # Packages kept per category
# top_n_stats_per_subcategory: 5      # Processes kept per package
#
# Collection Caches
# -----------------
# max_user_switch_events: 3           # Concurrent user-switch sessions
# periodic_collection_buffer_size: 180 # Periodic records kept (FIFO)
# system_event_data_cache_duration_secs: 3600 # Boot/wake/user-switch retention
# sync_resource_usage_stats: false    # Mirror resource usage after registration
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                     # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                          # HTTP port
# sample_interval_secs: 60            # Seconds between periodic collections
#
# Logging
# -------
# log_level: "info"                   # off, error, warn, info, debug, trace
#
# Collection Intervals (milliseconds, reported in protobuf dumps)
# ---------------------------------------------------------------
# collection_intervals:
#   boottime_interval_millis: 1000
#   periodic_interval_millis: 60000
#   user_switch_interval_millis: 2000
#   wake_up_interval_millis: 2000
#   custom_interval_millis: 10000
"#;

    format!("{comments}\n{yaml}")
}
