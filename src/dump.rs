//! Human-readable rendering of the collection caches.
//!
//! Rendering is a pure projection of the records: nothing here ranks or
//! filters. Empty collections render [`EMPTY_COLLECTION_MESSAGE`] so log
//! scrapers always see the same set of sections.

use chrono::{DateTime, Local};
use std::fmt::Write as FmtWrite;

use crate::cache::{Collection, CollectionKind, UserSwitchCollections};
use crate::collector::{user_id, IoMetric, UidState};
use crate::record::{percentage, AggregateSummary, RankedEntry, Record, SystemSummary};

pub const EMPTY_COLLECTION_MESSAGE: &str = "No collection recorded\n";

const CPU_TIME_HEADER: &str = "Android User ID, Package Name, CPU Time (ms), Percentage of total \
     CPU time, CPU Cycles\n\tCommand, CPU Time (ms), Percentage of UID's CPU Time, CPU Cycles\n";
const IO_STATS_HEADER: &str = "Android User ID, Package Name, Foreground Bytes, Foreground Bytes %, \
     Foreground Fsync, Foreground Fsync %, Background Bytes, Background Bytes %, Background Fsync, \
     Background Fsync %\n";
const IO_BLOCKED_HEADER: &str = "Android User ID, Package Name, Number of owned tasks waiting for \
     I/O, Percentage of owned tasks waiting for I/O\n\tCommand, Number of I/O waiting tasks, \
     Percentage of UID's tasks waiting for I/O\n";
const MAJOR_FAULTS_HEADER: &str = "Android User ID, Package Name, Number of major page faults, \
     Percentage of total major page faults\n\tCommand, Number of major page faults, Percentage of \
     UID's major page faults\n";

/// Report title of a collection kind.
pub fn section_title(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::BootTime => "Boot-time performance report:",
        CollectionKind::WakeUp => "Wake-up performance report:",
        CollectionKind::UserSwitch => "User-switch events performance report:",
        CollectionKind::Periodic => "Last N minutes performance report:",
        CollectionKind::Custom => "Custom performance data report:",
    }
}

/// Writes the dashed banner and underlined title of a section.
pub fn render_section_header(out: &mut String, kind: CollectionKind) {
    let title = section_title(kind);
    writeln!(out, "{}", "-".repeat(75)).ok();
    writeln!(out, "{}", title).ok();
    writeln!(out, "{}", "=".repeat(title.len() - 1)).ok();
}

/// Renders a titled collection section.
pub fn render_collection_section(out: &mut String, kind: CollectionKind, collection: &Collection) {
    render_section_header(out, kind);
    render_collection(out, collection);
}

/// Renders the user-switch section with one block per session.
pub fn render_user_switch_section(out: &mut String, sessions: &UserSwitchCollections) {
    render_section_header(out, CollectionKind::UserSwitch);
    if sessions.is_empty() {
        out.push_str(EMPTY_COLLECTION_MESSAGE);
        return;
    }
    writeln!(out, "Number of user switch events: {}", sessions.len()).ok();
    for (i, session) in sessions.sessions().iter().enumerate() {
        writeln!(
            out,
            "\nEvent {}: From: {} To: {}",
            i, session.from_user, session.to_user
        )
        .ok();
        writeln!(out, "{}", "=".repeat(26)).ok();
        render_collection(out, &session.collection);
    }
}

/// Renders every record of `collection`, or the empty marker.
pub fn render_collection(out: &mut String, collection: &Collection) {
    if collection.is_empty() {
        out.push_str(EMPTY_COLLECTION_MESSAGE);
        return;
    }
    writeln!(
        out,
        "Collection duration: {} seconds",
        collection.duration().as_secs()
    )
    .ok();
    writeln!(out, "Number of collections: {}", collection.len()).ok();
    for (i, record) in collection.iter().enumerate() {
        let timestamp: DateTime<Local> = record.time.into();
        writeln!(out, "\nCollection {}: <{}>", i, timestamp.format("%c %Z")).ok();
        writeln!(out, "{}", "=".repeat(45)).ok();
        render_record(out, record);
    }
}

pub fn render_record(out: &mut String, record: &Record) {
    render_system_summary(out, &record.system_summary);
    render_aggregate_summary(out, &record.aggregate_summary);
}

fn render_system_summary(out: &mut String, system: &SystemSummary) {
    let total = system.total_cpu_time_ms;
    writeln!(out, "Total CPU time (ms): {}", total).ok();
    writeln!(out, "Total CPU cycles: {}", system.total_cpu_cycles).ok();
    writeln!(
        out,
        "Total idle CPU time (ms)/percent: {} / {:.2}%",
        system.cpu_idle_time_ms,
        percentage(system.cpu_idle_time_ms, total)
    )
    .ok();
    writeln!(
        out,
        "CPU I/O wait time (ms)/percent: {} / {:.2}%",
        system.cpu_io_wait_time_ms,
        percentage(system.cpu_io_wait_time_ms, total)
    )
    .ok();
    writeln!(out, "Number of context switches: {}", system.context_switches).ok();
    writeln!(
        out,
        "Number of I/O blocked processes/percent: {} / {:.2}%",
        system.io_blocked_process_count,
        percentage(
            u64::from(system.io_blocked_process_count),
            u64::from(system.total_process_count)
        )
    )
    .ok();
}

fn render_category_title(out: &mut String, title: &str) {
    writeln!(out, "\n{}", title).ok();
    writeln!(out, "{}", "-".repeat(title.len() - 1)).ok();
}

fn render_aggregate_summary(out: &mut String, agg: &AggregateSummary) {
    if !agg.top_n_cpu_times.is_empty() {
        render_category_title(out, "Top N CPU Times:");
        out.push_str(CPU_TIME_HEADER);
        for entry in &agg.top_n_cpu_times {
            render_cpu_entry(out, entry, agg.total_cpu_time_ms);
        }
    }
    if !agg.top_n_io_reads.is_empty() {
        render_category_title(out, "Top N Storage I/O Reads:");
        out.push_str(IO_STATS_HEADER);
        for entry in &agg.top_n_io_reads {
            render_io_entry(out, entry, agg, IoMetric::ReadBytes);
        }
    }
    if !agg.top_n_io_writes.is_empty() {
        render_category_title(out, "Top N Storage I/O Writes:");
        out.push_str(IO_STATS_HEADER);
        for entry in &agg.top_n_io_writes {
            render_io_entry(out, entry, agg, IoMetric::WriteBytes);
        }
    }
    if !agg.top_n_io_blocked.is_empty() {
        render_category_title(out, "Top N I/O waiting UIDs:");
        out.push_str(IO_BLOCKED_HEADER);
        for entry in &agg.top_n_io_blocked {
            // Blocked tasks are reported against the UID's own task count.
            let Some(task_count) = agg.task_count_by_uid.get(&entry.uid) else {
                continue;
            };
            render_single_value_entry(out, entry, u64::from(*task_count));
        }
    }
    if !agg.top_n_major_faults.is_empty() {
        render_category_title(out, "Top N major page faults:");
        out.push_str(MAJOR_FAULTS_HEADER);
        for entry in &agg.top_n_major_faults {
            render_single_value_entry(out, entry, agg.total_major_faults);
        }
        writeln!(
            out,
            "Number of major page faults since last collection: {}",
            agg.total_major_faults
        )
        .ok();
        writeln!(
            out,
            "Percentage of change in major page faults since last collection: {:.2}%",
            agg.major_faults_percent_change
        )
        .ok();
    }
}

fn render_cpu_entry(out: &mut String, entry: &RankedEntry, total_cpu_time_ms: u64) {
    let Some(cpu) = entry.as_cpu() else {
        return;
    };
    writeln!(
        out,
        "{}, {}, {}, {:.2}%, {}",
        user_id(entry.uid),
        entry.package_name,
        cpu.cpu_time_ms,
        percentage(cpu.cpu_time_ms, total_cpu_time_ms),
        cpu.cpu_cycles
    )
    .ok();
    for process in &cpu.top_n_processes {
        writeln!(
            out,
            "\t{}, {}, {:.2}%, {}",
            process.comm,
            process.cpu_time_ms,
            percentage(process.cpu_time_ms, cpu.cpu_time_ms),
            process.cpu_cycles
        )
        .ok();
    }
}

fn render_io_entry(out: &mut String, entry: &RankedEntry, agg: &AggregateSummary, metric: IoMetric) {
    let Some(io) = entry.as_io() else {
        return;
    };
    write!(out, "{}, {}", user_id(entry.uid), entry.package_name).ok();
    let states = [UidState::Foreground, UidState::Background];
    for (i, state) in states.iter().enumerate() {
        write!(
            out,
            ", {}, {:.2}%, {}, {:.2}%",
            io.bytes[i],
            percentage(io.bytes[i], agg.total_io(metric, *state)),
            io.fsync[i],
            percentage(io.fsync[i], agg.total_io(IoMetric::FsyncCount, *state))
        )
        .ok();
    }
    writeln!(out).ok();
}

fn render_single_value_entry(out: &mut String, entry: &RankedEntry, total: u64) {
    let Some(single) = entry.as_single_value() else {
        return;
    };
    writeln!(
        out,
        "{}, {}, {}, {:.2}%",
        user_id(entry.uid),
        entry.package_name,
        single.value,
        percentage(single.value, total)
    )
    .ok();
    for process in &single.top_n_processes {
        writeln!(
            out,
            "\t{}, {}, {:.2}%",
            process.comm,
            process.value,
            percentage(process.value, single.value)
        )
        .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CpuView, IoView, ProcessCpuValue, ProcessValue, SingleValueView, StatsView};
    use std::time::{Duration, SystemTime};

    fn sample_record() -> Record {
        let mut agg = AggregateSummary {
            total_cpu_time_ms: 200,
            total_major_faults: 100,
            major_faults_percent_change: 12.5,
            top_n_cpu_times: vec![RankedEntry {
                uid: 1_012_345,
                package_name: "1012345".into(),
                view: StatsView::Cpu(CpuView {
                    cpu_time_ms: 100,
                    cpu_cycles: 50_000,
                    top_n_processes: vec![ProcessCpuValue {
                        comm: "MapsApp".into(),
                        cpu_time_ms: 50,
                        cpu_cycles: 25_000,
                    }],
                }),
            }],
            top_n_io_reads: vec![RankedEntry {
                uid: 1009,
                package_name: "mount".into(),
                view: StatsView::Io(IoView {
                    bytes: [0, 14_000],
                    fsync: [0, 100],
                }),
            }],
            top_n_io_blocked: vec![RankedEntry {
                uid: 1009,
                package_name: "mount".into(),
                view: StatsView::SingleValue(SingleValueView {
                    value: 1,
                    top_n_processes: vec![ProcessValue {
                        comm: "disk I/O".into(),
                        value: 1,
                    }],
                }),
            }],
            top_n_major_faults: vec![RankedEntry {
                uid: 1009,
                package_name: "mount".into(),
                view: StatsView::SingleValue(SingleValueView {
                    value: 25,
                    top_n_processes: Vec::new(),
                }),
            }],
            ..Default::default()
        };
        agg.total_io_stats = [[0, 28_000], [0, 0], [0, 200]];
        agg.task_count_by_uid.insert(1009, 4);

        Record {
            time: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
            system_summary: SystemSummary {
                cpu_io_wait_time_ms: 50,
                cpu_idle_time_ms: 100,
                total_cpu_time_ms: 400,
                total_cpu_cycles: 50_000,
                context_switches: 500,
                io_blocked_process_count: 1,
                total_process_count: 4,
            },
            aggregate_summary: agg,
        }
    }

    #[test]
    fn test_render_empty_collection() {
        let mut out = String::new();
        render_collection_section(&mut out, CollectionKind::BootTime, &Collection::unbounded());
        assert!(out.contains("Boot-time performance report:"));
        assert!(out.ends_with(EMPTY_COLLECTION_MESSAGE));
    }

    #[test]
    fn test_render_record_lines() {
        let mut out = String::new();
        render_record(&mut out, &sample_record());

        assert!(out.contains("Total CPU time (ms): 400\n"));
        assert!(out.contains("Total idle CPU time (ms)/percent: 100 / 25.00%\n"));
        assert!(out.contains("CPU I/O wait time (ms)/percent: 50 / 12.50%\n"));
        assert!(out.contains("Number of I/O blocked processes/percent: 1 / 25.00%\n"));
        assert!(out.contains("10, 1012345, 100, 50.00%, 50000\n"));
        assert!(out.contains("\tMapsApp, 50, 50.00%, 25000\n"));
        assert!(out.contains("0, mount, 0, 0.00%, 0, 0.00%, 14000, 50.00%, 100, 50.00%\n"));
        assert!(out.contains("0, mount, 1, 25.00%\n\tdisk I/O, 1, 100.00%\n"));
        assert!(out.contains("0, mount, 25, 25.00%\n"));
        assert!(out.contains("Percentage of change in major page faults since last collection: 12.50%\n"));
        // Empty categories are left out.
        assert!(!out.contains("Top N Storage I/O Writes:"));
    }

    #[test]
    fn test_render_collection_counts_records() {
        let mut collection = Collection::unbounded();
        let first = sample_record();
        let mut second = sample_record();
        second.time = first.time + Duration::from_secs(60);
        collection.append(first, SystemTime::UNIX_EPOCH);
        collection.append(second, SystemTime::UNIX_EPOCH);

        let mut out = String::new();
        render_collection(&mut out, &collection);
        assert!(out.starts_with("Collection duration: 60 seconds\nNumber of collections: 2\n"));
        assert!(out.contains("\nCollection 0: <"));
        assert!(out.contains("\nCollection 1: <"));
    }

    #[test]
    fn test_render_user_switch_sessions() {
        let mut sessions = UserSwitchCollections::new(3, Duration::from_secs(3600));
        let mut out = String::new();
        render_user_switch_section(&mut out, &sessions);
        assert!(out.ends_with(EMPTY_COLLECTION_MESSAGE));

        let record = sample_record();
        let now = record.time;
        sessions.append(0, 100, record, now);
        let mut out = String::new();
        render_user_switch_section(&mut out, &sessions);
        assert!(out.contains("Number of user switch events: 1\n"));
        assert!(out.contains("\nEvent 0: From: 0 To: 100\n"));
    }
}
