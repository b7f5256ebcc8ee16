//! Structured (protobuf) projection of the collection caches.
//!
//! Messages are declared with `prost` derives so no build step is needed.
//! Field tags are part of the wire contract and must not be renumbered.

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::cache::Collection;
use crate::collector::{user_id, IoMetric, UidState};
use crate::record::{AggregateSummary, RankedEntry, Record};

#[derive(Clone, PartialEq, prost::Message)]
pub struct PerformanceProfilerDump {
    #[prost(message, optional, tag = "1")]
    pub performance_stats: Option<PerformanceStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PerformanceStats {
    #[prost(message, optional, tag = "1")]
    pub boot_time_stats: Option<StatsCollection>,
    #[prost(message, optional, tag = "2")]
    pub wake_up_stats: Option<StatsCollection>,
    #[prost(message, repeated, tag = "3")]
    pub user_switch_stats: Vec<StatsCollection>,
    #[prost(message, optional, tag = "4")]
    pub last_n_minutes_stats: Option<StatsCollection>,
    #[prost(message, optional, tag = "5")]
    pub custom_collection_stats: Option<StatsCollection>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatsCollection {
    #[prost(int64, tag = "1")]
    pub collection_interval_millis: i64,
    #[prost(message, repeated, tag = "2")]
    pub records: Vec<StatsRecord>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatsRecord {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(message, optional, tag = "2")]
    pub date: Option<Date>,
    #[prost(message, optional, tag = "3")]
    pub time: Option<TimeOfDay>,
    #[prost(message, optional, tag = "4")]
    pub system_wide_stats: Option<SystemWideStats>,
    #[prost(message, repeated, tag = "5")]
    pub package_cpu_stats: Vec<PackageCpuStats>,
    #[prost(message, repeated, tag = "6")]
    pub package_storage_io_read_stats: Vec<PackageStorageIoStats>,
    #[prost(message, repeated, tag = "7")]
    pub package_storage_io_write_stats: Vec<PackageStorageIoStats>,
    #[prost(message, repeated, tag = "8")]
    pub package_task_state_stats: Vec<PackageTaskStateStats>,
    #[prost(message, repeated, tag = "9")]
    pub package_major_page_faults: Vec<PackageMajorPageFaults>,
}

/// Local calendar date; `month` is 1-based.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Date {
    #[prost(int32, tag = "1")]
    pub year: i32,
    #[prost(int32, tag = "2")]
    pub month: i32,
    #[prost(int32, tag = "3")]
    pub day: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeOfDay {
    #[prost(int32, tag = "1")]
    pub hours: i32,
    #[prost(int32, tag = "2")]
    pub minutes: i32,
    #[prost(int32, tag = "3")]
    pub seconds: i32,
    #[prost(int32, tag = "4")]
    pub millis: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SystemWideStats {
    #[prost(int64, tag = "1")]
    pub io_wait_time_millis: i64,
    #[prost(int64, tag = "2")]
    pub idle_cpu_time_millis: i64,
    #[prost(int64, tag = "3")]
    pub total_cpu_time_millis: i64,
    #[prost(int64, tag = "4")]
    pub total_cpu_cycles: i64,
    #[prost(int64, tag = "5")]
    pub total_context_switches: i64,
    #[prost(int32, tag = "6")]
    pub total_io_blocked_processes: i32,
    #[prost(int64, tag = "7")]
    pub total_major_page_faults: i64,
    #[prost(message, optional, tag = "8")]
    pub total_storage_io_read_stats: Option<StorageIoStats>,
    #[prost(message, optional, tag = "9")]
    pub total_storage_io_write_stats: Option<StorageIoStats>,
    #[prost(int32, tag = "10")]
    pub total_processes: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StorageIoStats {
    #[prost(int64, tag = "1")]
    pub fg_bytes: i64,
    #[prost(int64, tag = "2")]
    pub fg_fsync: i64,
    #[prost(int64, tag = "3")]
    pub bg_bytes: i64,
    #[prost(int64, tag = "4")]
    pub bg_fsync: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserPackageInfo {
    #[prost(int32, tag = "1")]
    pub user_id: i32,
    #[prost(string, tag = "2")]
    pub package_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CpuStats {
    #[prost(int64, tag = "1")]
    pub cpu_time_millis: i64,
    #[prost(int64, tag = "2")]
    pub cpu_cycles: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessCpuStats {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(message, optional, tag = "2")]
    pub cpu_stats: Option<CpuStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PackageCpuStats {
    #[prost(message, optional, tag = "1")]
    pub user_package_info: Option<UserPackageInfo>,
    #[prost(message, optional, tag = "2")]
    pub cpu_stats: Option<CpuStats>,
    #[prost(message, repeated, tag = "3")]
    pub process_cpu_stats: Vec<ProcessCpuStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PackageStorageIoStats {
    #[prost(message, optional, tag = "1")]
    pub user_package_info: Option<UserPackageInfo>,
    #[prost(message, optional, tag = "2")]
    pub storage_io_stats: Option<StorageIoStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProcessTaskStateStats {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(int32, tag = "2")]
    pub io_blocked_task_count: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PackageTaskStateStats {
    #[prost(message, optional, tag = "1")]
    pub user_package_info: Option<UserPackageInfo>,
    #[prost(int32, tag = "2")]
    pub io_blocked_task_count: i32,
    #[prost(int32, tag = "3")]
    pub total_task_count: i32,
    #[prost(message, repeated, tag = "4")]
    pub process_task_state_stats: Vec<ProcessTaskStateStats>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PackageMajorPageFaults {
    #[prost(message, optional, tag = "1")]
    pub user_package_info: Option<UserPackageInfo>,
    #[prost(int64, tag = "2")]
    pub major_page_faults_count: i64,
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn clamp_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Projects `collection` with its sampling interval. Record ids start at 0.
pub fn stats_collection(collection: &Collection, interval_millis: u64) -> StatsCollection {
    StatsCollection {
        collection_interval_millis: clamp_i64(interval_millis),
        records: collection
            .iter()
            .enumerate()
            .map(|(id, record)| stats_record(id, record))
            .collect(),
    }
}

pub fn stats_record(id: usize, record: &Record) -> StatsRecord {
    let local: DateTime<Local> = record.time.into();
    let agg = &record.aggregate_summary;

    StatsRecord {
        id: i32::try_from(id).unwrap_or(i32::MAX),
        date: Some(Date {
            year: local.year(),
            month: local.month() as i32,
            day: local.day() as i32,
        }),
        time: Some(TimeOfDay {
            hours: local.hour() as i32,
            minutes: local.minute() as i32,
            seconds: local.second() as i32,
            millis: (local.nanosecond() / 1_000_000).min(999) as i32,
        }),
        system_wide_stats: Some(system_wide_stats(record)),
        package_cpu_stats: agg.top_n_cpu_times.iter().filter_map(package_cpu_stats).collect(),
        package_storage_io_read_stats: agg
            .top_n_io_reads
            .iter()
            .filter_map(package_storage_io_stats)
            .collect(),
        package_storage_io_write_stats: agg
            .top_n_io_writes
            .iter()
            .filter_map(package_storage_io_stats)
            .collect(),
        package_task_state_stats: agg
            .top_n_io_blocked
            .iter()
            .filter_map(|entry| package_task_state_stats(entry, agg))
            .collect(),
        package_major_page_faults: agg
            .top_n_major_faults
            .iter()
            .filter_map(package_major_page_faults)
            .collect(),
    }
}

fn total_storage_io_stats(agg: &AggregateSummary, metric: IoMetric) -> StorageIoStats {
    StorageIoStats {
        fg_bytes: clamp_i64(agg.total_io(metric, UidState::Foreground)),
        fg_fsync: clamp_i64(agg.total_io(IoMetric::FsyncCount, UidState::Foreground)),
        bg_bytes: clamp_i64(agg.total_io(metric, UidState::Background)),
        bg_fsync: clamp_i64(agg.total_io(IoMetric::FsyncCount, UidState::Background)),
    }
}

fn system_wide_stats(record: &Record) -> SystemWideStats {
    let system = &record.system_summary;
    let agg = &record.aggregate_summary;
    SystemWideStats {
        io_wait_time_millis: clamp_i64(system.cpu_io_wait_time_ms),
        idle_cpu_time_millis: clamp_i64(system.cpu_idle_time_ms),
        total_cpu_time_millis: clamp_i64(system.total_cpu_time_ms),
        total_cpu_cycles: clamp_i64(system.total_cpu_cycles),
        total_context_switches: clamp_i64(system.context_switches),
        total_io_blocked_processes: clamp_i32(u64::from(system.io_blocked_process_count)),
        total_major_page_faults: clamp_i64(agg.total_major_faults),
        total_storage_io_read_stats: Some(total_storage_io_stats(agg, IoMetric::ReadBytes)),
        total_storage_io_write_stats: Some(total_storage_io_stats(agg, IoMetric::WriteBytes)),
        total_processes: clamp_i32(u64::from(system.total_process_count)),
    }
}

fn user_package_info(entry: &RankedEntry) -> UserPackageInfo {
    UserPackageInfo {
        user_id: clamp_i32(u64::from(user_id(entry.uid))),
        package_name: entry.package_name.clone(),
    }
}

fn package_cpu_stats(entry: &RankedEntry) -> Option<PackageCpuStats> {
    let cpu = entry.as_cpu()?;
    Some(PackageCpuStats {
        user_package_info: Some(user_package_info(entry)),
        cpu_stats: Some(CpuStats {
            cpu_time_millis: clamp_i64(cpu.cpu_time_ms),
            cpu_cycles: clamp_i64(cpu.cpu_cycles),
        }),
        process_cpu_stats: cpu
            .top_n_processes
            .iter()
            .map(|p| ProcessCpuStats {
                command: p.comm.clone(),
                cpu_stats: Some(CpuStats {
                    cpu_time_millis: clamp_i64(p.cpu_time_ms),
                    cpu_cycles: clamp_i64(p.cpu_cycles),
                }),
            })
            .collect(),
    })
}

fn package_storage_io_stats(entry: &RankedEntry) -> Option<PackageStorageIoStats> {
    let io = entry.as_io()?;
    Some(PackageStorageIoStats {
        user_package_info: Some(user_package_info(entry)),
        storage_io_stats: Some(StorageIoStats {
            fg_bytes: clamp_i64(io.bytes[UidState::Foreground as usize]),
            fg_fsync: clamp_i64(io.fsync[UidState::Foreground as usize]),
            bg_bytes: clamp_i64(io.bytes[UidState::Background as usize]),
            bg_fsync: clamp_i64(io.fsync[UidState::Background as usize]),
        }),
    })
}

fn package_task_state_stats(
    entry: &RankedEntry,
    agg: &AggregateSummary,
) -> Option<PackageTaskStateStats> {
    let single = entry.as_single_value()?;
    let total_task_count = agg.task_count_by_uid.get(&entry.uid)?;
    Some(PackageTaskStateStats {
        user_package_info: Some(user_package_info(entry)),
        io_blocked_task_count: clamp_i32(single.value),
        total_task_count: clamp_i32(u64::from(*total_task_count)),
        process_task_state_stats: single
            .top_n_processes
            .iter()
            .map(|p| ProcessTaskStateStats {
                command: p.comm.clone(),
                io_blocked_task_count: clamp_i32(p.value),
            })
            .collect(),
    })
}

fn package_major_page_faults(entry: &RankedEntry) -> Option<PackageMajorPageFaults> {
    let single = entry.as_single_value()?;
    Some(PackageMajorPageFaults {
        user_package_info: Some(user_package_info(entry)),
        major_page_faults_count: clamp_i64(single.value),
    })
}
