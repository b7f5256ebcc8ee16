//! Condensed resource usage handed back to the watchdog's health reporting.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::collector::{user_id, IoMetric, UidState};
use crate::record::Record;

/// Output parameter of boot-time, periodic and custom collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceStats {
    pub resource_usage_stats: Option<ResourceUsageStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceUsageStats {
    /// Collection time in milliseconds since the Unix epoch.
    pub start_time_epoch_millis: u64,
    /// Length of the sampled interval in milliseconds.
    pub duration_millis: u64,
    pub system_summary_usage_stats: SystemSummaryUsageStats,
    pub uid_resource_usage_stats: Vec<UidResourceUsageStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemSummaryUsageStats {
    pub cpu_non_idle_time_millis: u64,
    pub cpu_non_idle_cycles: u64,
    pub cpu_idle_time_millis: u64,
    pub context_switches: u64,
    pub io_blocked_process_count: u32,
    pub total_process_count: u32,
    pub total_major_page_faults: u64,
    pub total_io_read_bytes: u64,
    pub total_io_write_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UidResourceUsageStats {
    pub uid: u32,
    pub user_id: u32,
    pub package_name: String,
    pub cpu_time_millis: u64,
    pub cpu_cycles: u64,
}

impl ResourceUsageStats {
    /// Condenses `record` into the health-reporting shape.
    pub fn from_record(record: &Record, duration_millis: u64) -> Self {
        let system = &record.system_summary;
        let aggregate = &record.aggregate_summary;

        let idle = system.cpu_idle_time_ms;
        let system_summary_usage_stats = SystemSummaryUsageStats {
            cpu_non_idle_time_millis: system.total_cpu_time_ms.saturating_sub(idle),
            cpu_non_idle_cycles: system.total_cpu_cycles,
            cpu_idle_time_millis: idle,
            context_switches: system.context_switches,
            io_blocked_process_count: system.io_blocked_process_count,
            total_process_count: system.total_process_count,
            total_major_page_faults: aggregate.total_major_faults,
            total_io_read_bytes: aggregate
                .total_io(IoMetric::ReadBytes, UidState::Foreground)
                .saturating_add(aggregate.total_io(IoMetric::ReadBytes, UidState::Background)),
            total_io_write_bytes: aggregate
                .total_io(IoMetric::WriteBytes, UidState::Foreground)
                .saturating_add(aggregate.total_io(IoMetric::WriteBytes, UidState::Background)),
        };

        let uid_resource_usage_stats = aggregate
            .top_n_cpu_times
            .iter()
            .filter_map(|entry| {
                entry.as_cpu().map(|cpu| UidResourceUsageStats {
                    uid: entry.uid,
                    user_id: user_id(entry.uid),
                    package_name: entry.package_name.clone(),
                    cpu_time_millis: cpu.cpu_time_ms,
                    cpu_cycles: cpu.cpu_cycles,
                })
            })
            .collect();

        Self {
            start_time_epoch_millis: millis_between(UNIX_EPOCH, record.time),
            duration_millis,
            system_summary_usage_stats,
            uid_resource_usage_stats,
        }
    }
}

/// Milliseconds between two timestamps, 0 if `later` precedes `earlier`.
pub(crate) fn millis_between(earlier: SystemTime, later: SystemTime) -> u64 {
    later
        .duration_since(earlier)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
