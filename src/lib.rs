//! Resource-usage profiling engine for a system watchdog.
//!
//! Per-UID and system-wide deltas are reduced into bounded Top-N records and
//! kept in per-event collection caches (boot-time, wake-up, periodic,
//! user-switch and custom). The caches can be dumped as text or protobuf.

pub mod cache;
pub mod collector;
pub mod config;
pub mod dump;
pub mod error;
pub mod metrics;
pub mod profiler;
pub mod proto;
pub mod ranking;
pub mod record;
pub mod replay;
pub mod resource_stats;

pub use cache::{Collection, CollectionKind, EvictionPolicy, UserSwitchCollection, UserSwitchCollections};
pub use collector::{
    CpuTimes, IoMetric, IoStats, ProcStatCollector, ProcessDelta, SystemDelta, UidDelta,
    UidProcStats, UidState, UidStatsCollector,
};
pub use config::{load_config, CollectionIntervals, ProfilerConfig};
pub use error::{CollectorError, ProfilerError, Result};
pub use profiler::{PerformanceProfiler, SystemState};
pub use ranking::{parse_package_filter, PackageFilter, TopN};
pub use record::{AggregateSummary, RankedEntry, Record, StatsView, SystemSummary};
pub use replay::{load_replay_data, ReplayData, ReplaySample, ReplaySource};
pub use resource_stats::{ResourceStats, ResourceUsageStats};
