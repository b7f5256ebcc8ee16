//! Error types for the profiling engine.
//!
//! Collection handlers surface adapter failures as [`ProfilerError::Collector`]
//! without touching any cache. Dump failures leave the caches intact.

use std::io;
use thiserror::Error;

/// Result type alias for profiler operations.
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Error returned by a delta source when it cannot produce a sample.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("collector unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read delta stats: {0}")]
    Io(#[from] io::Error),

    #[error("no samples available")]
    Empty,
}

/// Main error type for the profiler.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("{source_name} failed to produce delta stats: {source}")]
    Collector {
        source_name: &'static str,
        #[source]
        source: CollectorError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to dump the {what} report: {source}")]
    Dump {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode the proto dump: {0}")]
    ProtoEncode(#[from] prost::EncodeError),

    #[error("Failed to load replay data: {0}")]
    Replay(String),

    #[error("Failed to register profiler metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ProfilerError {
    /// Wraps a sink write failure for the named report section.
    pub fn dump(what: &'static str, source: io::Error) -> Self {
        ProfilerError::Dump { what, source }
    }
}
