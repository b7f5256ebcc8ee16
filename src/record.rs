//! Records produced by one ranking pass.
//!
//! A [`Record`] is immutable once appended to a collection. Dump and proto
//! serializers only project these types; every Top-N decision is already
//! baked in by the ranking engine.

use ahash::AHashMap as HashMap;
use std::time::SystemTime;

use crate::collector::{IoMetric, IoStats, UidState, IO_METRICS, UID_STATES};

/// Foreground/background I/O of one UID for a single metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoView {
    /// Bytes indexed by [`UidState`].
    pub bytes: [u64; UID_STATES],
    /// Fsync counts indexed by [`UidState`].
    pub fsync: [u64; UID_STATES],
}

impl IoView {
    pub fn total_bytes(&self) -> u64 {
        self.bytes[0].saturating_add(self.bytes[1])
    }
}

/// A top contributing process for a single-value metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessValue {
    pub comm: String,
    pub value: u64,
}

/// Scalar metric (blocked tasks or major faults) with its top processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleValueView {
    pub value: u64,
    pub top_n_processes: Vec<ProcessValue>,
}

/// A top contributing process for CPU usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCpuValue {
    pub comm: String,
    pub cpu_time_ms: u64,
    pub cpu_cycles: u64,
}

/// CPU usage of a UID with its top processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuView {
    pub cpu_time_ms: u64,
    pub cpu_cycles: u64,
    pub top_n_processes: Vec<ProcessCpuValue>,
}

/// Shape of a ranked entry, one per metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsView {
    Io(IoView),
    SingleValue(SingleValueView),
    Cpu(CpuView),
}

/// One UID's entry in a ranked category list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub uid: u32,
    pub package_name: String,
    pub view: StatsView,
}

impl RankedEntry {
    /// Value the category is ranked by.
    pub fn value(&self) -> u64 {
        match &self.view {
            StatsView::Io(io) => io.total_bytes(),
            StatsView::SingleValue(single) => single.value,
            StatsView::Cpu(cpu) => cpu.cpu_time_ms,
        }
    }

    pub fn as_io(&self) -> Option<&IoView> {
        match &self.view {
            StatsView::Io(io) => Some(io),
            _ => None,
        }
    }

    pub fn as_single_value(&self) -> Option<&SingleValueView> {
        match &self.view {
            StatsView::SingleValue(single) => Some(single),
            _ => None,
        }
    }

    pub fn as_cpu(&self) -> Option<&CpuView> {
        match &self.view {
            StatsView::Cpu(cpu) => Some(cpu),
            _ => None,
        }
    }
}

/// System-wide summary of one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemSummary {
    pub cpu_io_wait_time_ms: u64,
    pub cpu_idle_time_ms: u64,
    pub total_cpu_time_ms: u64,
    pub total_cpu_cycles: u64,
    pub context_switches: u64,
    pub io_blocked_process_count: u32,
    pub total_process_count: u32,
}

/// Ranked per-package lists plus totals over every sampled UID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSummary {
    pub top_n_cpu_times: Vec<RankedEntry>,
    pub top_n_io_reads: Vec<RankedEntry>,
    pub top_n_io_writes: Vec<RankedEntry>,
    pub top_n_io_blocked: Vec<RankedEntry>,
    pub top_n_major_faults: Vec<RankedEntry>,
    /// Indexed by [`IoMetric`] then [`UidState`].
    pub total_io_stats: [[u64; UID_STATES]; IO_METRICS],
    pub task_count_by_uid: HashMap<u32, u32>,
    pub total_cpu_time_ms: u64,
    pub total_cpu_cycles: u64,
    pub total_major_faults: u64,
    pub major_faults_percent_change: f64,
}

impl AggregateSummary {
    pub fn total_io(&self, metric: IoMetric, state: UidState) -> u64 {
        self.total_io_stats[metric as usize][state as usize]
    }

    pub(crate) fn set_total_io(&mut self, io: IoStats) {
        self.total_io_stats = io.metrics;
    }
}

/// One collection event's computed stats.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: SystemTime,
    pub system_summary: SystemSummary,
    pub aggregate_summary: AggregateSummary,
}

/// Returns `numer` as a percentage of `denom`, or 0 when `denom` is 0.
pub fn percentage(numer: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        (numer as f64 / denom as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(10, 0), 0.0);
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ranked_entry_value_per_view() {
        let io = RankedEntry {
            uid: 1009,
            package_name: "mount".into(),
            view: StatsView::Io(IoView {
                bytes: [100, 200],
                fsync: [1, 2],
            }),
        };
        assert_eq!(io.value(), 300);
        assert!(io.as_cpu().is_none());

        let cpu = RankedEntry {
            uid: 1009,
            package_name: "mount".into(),
            view: StatsView::Cpu(CpuView {
                cpu_time_ms: 50,
                cpu_cycles: 4_000,
                top_n_processes: Vec::new(),
            }),
        };
        assert_eq!(cpu.value(), 50);
        assert_eq!(cpu.as_cpu().map(|c| c.cpu_cycles), Some(4_000));
    }
}
