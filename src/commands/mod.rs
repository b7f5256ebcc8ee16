//! CLI command implementations for herakles-perf-profiler.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and replay file validation
//! - `config`: Configuration file generation
//! - `generate-testdata`: Synthetic replay file generation
//! - `replay`: Offline run of a replay file through the profiler

pub mod check;
pub mod config;
pub mod generate;
pub mod replay;

// Re-export command functions
pub use check::command_check;
pub use config::{command_config, show_config};
pub use generate::command_generate_testdata;
pub use replay::command_replay;
