//! Delta types delivered by the external stat collectors.
//!
//! A collector samples the OS once per collection event and hands back the
//! per-UID and system-wide deltas for that interval. The profiler only reads
//! these values; it never keeps them past a single ranking pass.

use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

/// Offset between Android user ids in the UID space.
pub const AID_USER_OFFSET: u32 = 100_000;

/// Returns the user id that owns `uid`.
pub fn user_id(uid: u32) -> u32 {
    uid / AID_USER_OFFSET
}

/// Foreground/background split of a UID's I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UidState {
    Foreground = 0,
    Background = 1,
}

pub const UID_STATES: usize = 2;

/// I/O counter kinds tracked per UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoMetric {
    ReadBytes = 0,
    WriteBytes = 1,
    FsyncCount = 2,
}

pub const IO_METRICS: usize = 3;

/// I/O counters indexed by [`IoMetric`] then [`UidState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoStats {
    pub metrics: [[u64; UID_STATES]; IO_METRICS],
}

impl IoStats {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fg_read_bytes: u64,
        bg_read_bytes: u64,
        fg_write_bytes: u64,
        bg_write_bytes: u64,
        fg_fsync: u64,
        bg_fsync: u64,
    ) -> Self {
        Self {
            metrics: [
                [fg_read_bytes, bg_read_bytes],
                [fg_write_bytes, bg_write_bytes],
                [fg_fsync, bg_fsync],
            ],
        }
    }

    pub fn get(&self, metric: IoMetric, state: UidState) -> u64 {
        self.metrics[metric as usize][state as usize]
    }

    /// Foreground + background value of one metric.
    pub fn total(&self, metric: IoMetric) -> u64 {
        let row = &self.metrics[metric as usize];
        row[0].saturating_add(row[1])
    }

    /// Adds `other` into `self`, clamping at `u64::MAX`.
    pub fn accumulate(&mut self, other: &IoStats) {
        for (total, entry) in self.metrics.iter_mut().zip(other.metrics.iter()) {
            for (t, e) in total.iter_mut().zip(entry.iter()) {
                *t = t.saturating_add(*e);
            }
        }
    }
}

/// Per-process counters for one interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDelta {
    pub pid: u32,
    pub comm: String,
    pub start_time: u64,
    pub cpu_time_ms: u64,
    pub cpu_cycles: u64,
    pub major_faults: u64,
    pub task_count: u32,
    pub io_blocked_task_count: u32,
}

/// Aggregated process counters of one UID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidProcStats {
    pub cpu_time_ms: u64,
    pub cpu_cycles: u64,
    pub total_major_faults: u64,
    pub total_task_count: u32,
    pub io_blocked_task_count: u32,
    #[serde(default)]
    pub processes: Vec<ProcessDelta>,
}

/// One package's counters for the sampled interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidDelta {
    pub uid: u32,
    /// Resolved package name; empty when the package could not be resolved.
    #[serde(default)]
    pub package_name: String,
    pub cpu_time_ms: u64,
    #[serde(default)]
    pub io: IoStats,
    #[serde(default)]
    pub proc_stats: UidProcStats,
}

impl UidDelta {
    /// Package name used for reporting, falling back to the UID.
    pub fn generic_package_name(&self) -> String {
        if self.package_name.is_empty() {
            self.uid.to_string()
        } else {
            self.package_name.clone()
        }
    }
}

/// Cumulative CPU time split as reported by `/proc/stat`, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub io_wait: u64,
    pub irq: u64,
    pub soft_irq: u64,
    pub steal: u64,
    #[serde(default)]
    pub guest: u64,
    #[serde(default)]
    pub guest_nice: u64,
}

impl CpuTimes {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        [
            self.nice,
            self.system,
            self.idle,
            self.io_wait,
            self.irq,
            self.soft_irq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
        .iter()
        .fold(self.user, |total, v| total.saturating_add(*v))
    }

    /// Calculate non-active time (idle + iowait).
    pub fn idle_total(&self) -> u64 {
        self.idle.saturating_add(self.io_wait)
    }
}

/// System-wide counters for the sampled interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDelta {
    pub cpu: CpuTimes,
    pub context_switches: u64,
    pub runnable_process_count: u32,
    pub io_blocked_process_count: u32,
}

impl SystemDelta {
    pub fn total_cpu_time_ms(&self) -> u64 {
        self.cpu.total()
    }

    pub fn total_process_count(&self) -> u32 {
        self.runnable_process_count
            .saturating_add(self.io_blocked_process_count)
    }
}

/// Source of per-UID deltas, queried at most once per collection event.
pub trait UidStatsCollector: Send + Sync {
    fn delta_stats(&self) -> Result<Vec<UidDelta>, CollectorError>;
}

/// Source of system-wide deltas, queried at most once per collection event.
pub trait ProcStatCollector: Send + Sync {
    fn delta_stats(&self) -> Result<SystemDelta, CollectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_times_total() {
        let cpu = CpuTimes {
            user: 2_900,
            nice: 7_900,
            system: 4_900,
            idle: 8_900,
            io_wait: 5_900,
            irq: 6_966,
            soft_irq: 7_980,
            steal: 0,
            guest: 0,
            guest_nice: 2_930,
        };
        assert_eq!(cpu.total(), 48_376);
        assert_eq!(cpu.idle_total(), 14_800);
    }

    #[test]
    fn test_system_totals_saturate() {
        let delta = SystemDelta {
            cpu: CpuTimes {
                user: u64::MAX,
                idle: 1,
                io_wait: u64::MAX,
                ..Default::default()
            },
            runnable_process_count: u32::MAX,
            io_blocked_process_count: 1,
            ..Default::default()
        };
        assert_eq!(delta.total_cpu_time_ms(), u64::MAX);
        assert_eq!(delta.cpu.idle_total(), u64::MAX);
        assert_eq!(delta.total_process_count(), u32::MAX);
    }

    #[test]
    fn test_io_stats_accumulate_saturates() {
        let mut total = IoStats::new(u64::MAX - 1, 0, 0, 0, 0, 0);
        total.accumulate(&IoStats::new(10, 5, 1, 2, 3, 4));
        assert_eq!(total.get(IoMetric::ReadBytes, UidState::Foreground), u64::MAX);
        assert_eq!(total.get(IoMetric::ReadBytes, UidState::Background), 5);
        assert_eq!(total.total(IoMetric::FsyncCount), 7);
    }

    #[test]
    fn test_generic_package_name_falls_back_to_uid() {
        let delta = UidDelta {
            uid: 1_012_345,
            ..Default::default()
        };
        assert_eq!(delta.generic_package_name(), "1012345");
        assert_eq!(user_id(1_012_345), 10);
    }
}
