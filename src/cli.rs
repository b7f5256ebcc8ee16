//! CLI arguments and subcommands for herakles-perf-profiler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-perf-profiler",
    about = "Resource-usage profiler with bounded Top-N collection caches",
    long_about = "Resource-usage profiler with bounded Top-N collection caches.\n\n\
                  Reduces per-UID CPU, storage I/O, blocked-task and major page fault deltas \
                  into Top-N records and keeps boot-time, wake-up, periodic, user-switch and \
                  custom collections. Serves text and protobuf dumps over HTTP.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/herakles-io/herakles-perf-profiler — More info: https://www.herakles.io — Support: proc-mem@herakles.io"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Top-N packages kept per category (override config)
    #[arg(long)]
    pub top_n_category: Option<usize>,

    /// Top-N processes kept per package (override config)
    #[arg(long)]
    pub top_n_subcategory: Option<usize>,

    /// Maximum concurrent user-switch sessions (override config)
    #[arg(long)]
    pub max_user_switch_events: Option<usize>,

    /// Periodic collection capacity in records (override config)
    #[arg(long)]
    pub periodic_buffer_size: Option<usize>,

    /// Retention of boot-time, wake-up and user-switch records in seconds
    #[arg(long)]
    pub retention_secs: Option<u64>,

    /// Seconds between periodic collections in server mode
    #[arg(long)]
    pub sample_interval_secs: Option<u64>,

    /// Mirror resource usage stats after service registration
    #[arg(long)]
    pub sync_resource_usage: bool,

    /// Replay file used as delta source in server mode (synthetic data if absent)
    #[arg(short = 't', long)]
    pub replay_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and, optionally, a replay file
    Check {
        /// Replay file to load and run through one collection
        #[arg(short = 'r', long)]
        replay: Option<PathBuf>,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Generate a synthetic replay file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "replay.json")]
        output: PathBuf,

        /// Number of sampling intervals
        #[arg(long, default_value_t = 10)]
        samples: usize,

        /// Number of UIDs per interval
        #[arg(long, default_value_t = 20)]
        uids: usize,

        /// Maximum processes per UID
        #[arg(long, default_value_t = 4)]
        processes_per_uid: usize,
    },

    /// Run a replay file through the profiler and print the dump
    Replay {
        /// Replay file (JSON)
        file: PathBuf,

        /// Also write the protobuf dump to this file
        #[arg(long)]
        proto_output: Option<PathBuf>,

        /// Run custom collections restricted to these packages (comma-separated)
        #[arg(long)]
        packages: Option<String>,

        /// Switch users before the last sample, as FROM:TO
        #[arg(long)]
        user_switch: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay_subcommand() {
        let args = Args::parse_from([
            "herakles-perf-profiler",
            "--top-n-category",
            "3",
            "replay",
            "samples.json",
            "--packages",
            "mount,com.google.radio",
        ]);
        assert_eq!(args.top_n_category, Some(3));
        match args.command {
            Some(Commands::Replay { file, packages, .. }) => {
                assert_eq!(file, PathBuf::from("samples.json"));
                assert_eq!(packages.as_deref(), Some("mount,com.google.radio"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_server_mode_without_subcommand() {
        let args = Args::parse_from(["herakles-perf-profiler", "-p", "9300", "--log-level", "debug"]);
        assert!(args.command.is_none());
        assert_eq!(args.port, Some(9300));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
