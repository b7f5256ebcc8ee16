//! Application state management for the profiler server.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background collection task.

use herakles_perf_profiler::{PerformanceProfiler, ProfilerConfig, ReplaySource, ResourceStats};
use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::RwLock;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Outcome of the background collections, shown on `/health`.
#[derive(Debug, Clone, Default)]
pub struct CollectionStatus {
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub total_collections: u64,
    pub failed_collections: u64,
    /// Resource usage mirrored by the newest periodic collection.
    pub resource_stats: ResourceStats,
}

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub profiler: PerformanceProfiler,
    pub source: ReplaySource,
    pub config: Arc<ProfilerConfig>,
    pub scrape_duration: Gauge,
    pub status: RwLock<CollectionStatus>,
    pub started_at: Instant,
}

impl AppState {
    /// Records the outcome of one collection for `/health`.
    pub async fn record_outcome(&self, result: &herakles_perf_profiler::Result<()>) {
        let mut status = self.status.write().await;
        status.total_collections += 1;
        match result {
            Ok(()) => {
                status.last_success = Some(SystemTime::now());
                status.last_error = None;
            }
            Err(e) => {
                status.failed_collections += 1;
                status.last_error = Some(e.to_string());
            }
        }
    }
}
