//! Tracing subscriber setup.

use clap::ValueEnum;
use tracing::info;
use tracing::level_filters::LevelFilter;

use crate::cli::LogLevel;

/// Resolves the effective level: CLI flag, then the config value, then info.
pub fn effective_level(cli: Option<&LogLevel>, configured: &str) -> LogLevel {
    if let Some(level) = cli {
        return level.clone();
    }
    LogLevel::from_str(configured, true).unwrap_or(LogLevel::Info)
}

/// Initializes tracing logging subsystem with the given log level
pub fn setup_logging(level: &LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    // Logs go to stderr so dumps on stdout stay clean.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}
