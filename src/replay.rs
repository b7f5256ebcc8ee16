//! File-backed delta sources.
//!
//! A replay file holds a sequence of recorded intervals. [`ReplaySource`]
//! serves them one at a time to the profiler in place of live collectors.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::collector::{ProcStatCollector, SystemDelta, UidDelta, UidStatsCollector};
use crate::error::{CollectorError, ProfilerError, Result};

/// One recorded sampling interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySample {
    #[serde(default)]
    pub uid_deltas: Vec<UidDelta>,
    #[serde(default)]
    pub system_delta: SystemDelta,
}

/// Root structure of a replay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayData {
    pub version: String,
    pub generated_at: String,
    pub samples: Vec<ReplaySample>,
}

/// Load replay data from a JSON file.
pub fn load_replay_data(path: &Path) -> Result<ReplayData> {
    debug!("Loading replay data from: {}", path.display());

    if !path.exists() {
        return Err(ProfilerError::Replay(format!(
            "replay file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ProfilerError::Replay(format!("failed to read {}: {}", path.display(), e)))?;
    let data: ReplayData = serde_json::from_str(&content)
        .map_err(|e| ProfilerError::Replay(format!("failed to parse {}: {}", path.display(), e)))?;

    info!(
        "Loaded replay data version {} ({} samples, generated {})",
        data.version,
        data.samples.len(),
        data.generated_at
    );
    Ok(data)
}

/// Serves recorded samples in order, wrapping around at the end.
#[derive(Debug)]
pub struct ReplaySource {
    samples: Vec<ReplaySample>,
    cursor: AtomicUsize,
}

impl ReplaySource {
    pub fn new(data: ReplayData) -> Self {
        Self {
            samples: data.samples,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the sample currently served.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Moves to the next sample.
    pub fn advance(&self) {
        let len = self.samples.len();
        if len == 0 {
            return;
        }
        // fetch_update never fails with a closure returning Some.
        let _ = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len));
    }

    fn current(&self) -> std::result::Result<&ReplaySample, CollectorError> {
        self.samples
            .get(self.position())
            .ok_or(CollectorError::Empty)
    }
}

impl UidStatsCollector for ReplaySource {
    fn delta_stats(&self) -> std::result::Result<Vec<UidDelta>, CollectorError> {
        Ok(self.current()?.uid_deltas.clone())
    }
}

impl ProcStatCollector for ReplaySource {
    fn delta_stats(&self) -> std::result::Result<SystemDelta, CollectorError> {
        Ok(self.current()?.system_delta)
    }
}
