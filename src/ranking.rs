//! Top-N ranking of per-UID deltas.
//!
//! [`compute`] is pure: given one interval's deltas it builds a [`Record`]
//! holding bounded ranked lists per category and totals over every UID.

use ahash::AHashSet as HashSet;
use std::time::SystemTime;

use crate::collector::{IoMetric, IoStats, SystemDelta, UidDelta, UidState};
use crate::record::{
    AggregateSummary, CpuView, IoView, ProcessCpuValue, ProcessValue, RankedEntry, Record,
    SingleValueView, StatsView, SystemSummary,
};

/// Package names a custom collection is restricted to; empty means all.
pub type PackageFilter = HashSet<String>;

/// Parses a comma-separated package list, ignoring blanks.
pub fn parse_package_filter(list: &str) -> PackageFilter {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Ranking bounds for one computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopN {
    pub per_category: usize,
    pub per_subcategory: usize,
}

/// Per-process metric used for subcategory ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessMetric {
    IoBlockedTasks,
    MajorFaults,
}

/// Builds one record from the deltas of a single interval.
///
/// `package_filter` restricts the ranked lists to matching packages and lifts
/// the category bound. `previous` is the newest record of the target
/// collection and feeds `major_faults_percent_change`.
pub fn compute(
    time: SystemTime,
    uid_deltas: &[UidDelta],
    system_delta: &SystemDelta,
    top_n: TopN,
    package_filter: &PackageFilter,
    previous: Option<&Record>,
) -> Record {
    let mut aggregate = rank_uid_stats(uid_deltas, top_n, package_filter);

    let previous_major_faults = previous
        .map(|r| r.aggregate_summary.total_major_faults)
        .unwrap_or(0);
    aggregate.major_faults_percent_change =
        percent_change(previous_major_faults, aggregate.total_major_faults);

    let system_summary = SystemSummary {
        cpu_io_wait_time_ms: system_delta.cpu.io_wait,
        cpu_idle_time_ms: system_delta.cpu.idle,
        total_cpu_time_ms: system_delta.total_cpu_time_ms(),
        // Cycles are only reported per UID, so the system value is their sum.
        total_cpu_cycles: aggregate.total_cpu_cycles,
        context_switches: system_delta.context_switches,
        io_blocked_process_count: system_delta.io_blocked_process_count,
        total_process_count: system_delta.total_process_count(),
    };

    Record {
        time,
        system_summary,
        aggregate_summary: aggregate,
    }
}

/// Percentage change from `previous` to `current`; 0 when `previous` is 0.
pub fn percent_change(previous: u64, current: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    let increase = current as f64 - previous as f64;
    (increase / previous as f64) * 100.0
}

fn rank_uid_stats(
    uid_deltas: &[UidDelta],
    top_n: TopN,
    package_filter: &PackageFilter,
) -> AggregateSummary {
    let mut summary = AggregateSummary::default();
    let mut total_io = IoStats::default();

    let mut cpu_times = Vec::new();
    let mut io_reads = Vec::new();
    let mut io_writes = Vec::new();
    let mut io_blocked = Vec::new();
    let mut major_faults = Vec::new();

    for delta in uid_deltas {
        // Totals cover every UID, regardless of filtering or truncation.
        summary.total_cpu_time_ms = summary.total_cpu_time_ms.saturating_add(delta.cpu_time_ms);
        summary.total_cpu_cycles = summary
            .total_cpu_cycles
            .saturating_add(delta.proc_stats.cpu_cycles);
        summary.total_major_faults = summary
            .total_major_faults
            .saturating_add(delta.proc_stats.total_major_faults);
        total_io.accumulate(&delta.io);
        summary
            .task_count_by_uid
            .insert(delta.uid, delta.proc_stats.total_task_count);

        let package_name = delta.generic_package_name();
        if !package_filter.is_empty() && !package_filter.contains(&package_name) {
            continue;
        }

        cpu_times.push(cpu_entry(delta, &package_name, top_n.per_subcategory));
        io_reads.push(io_entry(delta, &package_name, IoMetric::ReadBytes));
        io_writes.push(io_entry(delta, &package_name, IoMetric::WriteBytes));
        io_blocked.push(single_value_entry(
            delta,
            &package_name,
            ProcessMetric::IoBlockedTasks,
            top_n.per_subcategory,
        ));
        major_faults.push(single_value_entry(
            delta,
            &package_name,
            ProcessMetric::MajorFaults,
            top_n.per_subcategory,
        ));
    }

    summary.set_total_io(total_io);

    if package_filter.is_empty() {
        summary.top_n_cpu_times = top_entries(cpu_times, top_n.per_category);
        summary.top_n_io_reads = top_entries(io_reads, top_n.per_category);
        summary.top_n_io_writes = top_entries(io_writes, top_n.per_category);
        summary.top_n_io_blocked = top_entries(io_blocked, top_n.per_category);
        summary.top_n_major_faults = top_entries(major_faults, top_n.per_category);
    } else {
        summary.top_n_cpu_times = cpu_times;
        summary.top_n_io_reads = io_reads;
        summary.top_n_io_writes = io_writes;
        summary.top_n_io_blocked = io_blocked;
        summary.top_n_major_faults = major_faults;
    }

    summary
}

/// Keeps the `limit` largest non-zero entries, ties in input order.
fn top_entries(mut entries: Vec<RankedEntry>, limit: usize) -> Vec<RankedEntry> {
    entries.retain(|e| e.value() > 0);
    // sort_by is stable, so equal values keep their sampling order.
    entries.sort_by(|a, b| b.value().cmp(&a.value()));
    entries.truncate(limit);
    entries
}

fn io_entry(delta: &UidDelta, package_name: &str, metric: IoMetric) -> RankedEntry {
    let io = &delta.io;
    RankedEntry {
        uid: delta.uid,
        package_name: package_name.to_string(),
        view: StatsView::Io(IoView {
            bytes: [
                io.get(metric, UidState::Foreground),
                io.get(metric, UidState::Background),
            ],
            fsync: [
                io.get(IoMetric::FsyncCount, UidState::Foreground),
                io.get(IoMetric::FsyncCount, UidState::Background),
            ],
        }),
    }
}

fn cpu_entry(delta: &UidDelta, package_name: &str, limit: usize) -> RankedEntry {
    let mut processes: Vec<ProcessCpuValue> = delta
        .proc_stats
        .processes
        .iter()
        .filter(|p| p.cpu_time_ms > 0)
        .map(|p| ProcessCpuValue {
            comm: p.comm.clone(),
            cpu_time_ms: p.cpu_time_ms,
            cpu_cycles: p.cpu_cycles,
        })
        .collect();
    processes.sort_by(|a, b| b.cpu_time_ms.cmp(&a.cpu_time_ms));
    processes.truncate(limit);

    RankedEntry {
        uid: delta.uid,
        package_name: package_name.to_string(),
        view: StatsView::Cpu(CpuView {
            cpu_time_ms: delta.cpu_time_ms,
            cpu_cycles: delta.proc_stats.cpu_cycles,
            top_n_processes: processes,
        }),
    }
}

fn single_value_entry(
    delta: &UidDelta,
    package_name: &str,
    metric: ProcessMetric,
    limit: usize,
) -> RankedEntry {
    let value = match metric {
        ProcessMetric::IoBlockedTasks => u64::from(delta.proc_stats.io_blocked_task_count),
        ProcessMetric::MajorFaults => delta.proc_stats.total_major_faults,
    };

    let mut processes: Vec<ProcessValue> = delta
        .proc_stats
        .processes
        .iter()
        .map(|p| ProcessValue {
            comm: p.comm.clone(),
            value: match metric {
                ProcessMetric::IoBlockedTasks => u64::from(p.io_blocked_task_count),
                ProcessMetric::MajorFaults => p.major_faults,
            },
        })
        .filter(|p| p.value > 0)
        .collect();
    processes.sort_by(|a, b| b.value.cmp(&a.value));
    processes.truncate(limit);

    RankedEntry {
        uid: delta.uid,
        package_name: package_name.to_string(),
        view: StatsView::SingleValue(SingleValueView {
            value,
            top_n_processes: processes,
        }),
    }
}
