//! End-to-end tests of the profiler driven by in-memory delta sources.

use herakles_perf_profiler::dump::EMPTY_COLLECTION_MESSAGE;
use herakles_perf_profiler::proto::PerformanceProfilerDump;
use herakles_perf_profiler::{
    CollectionIntervals, CollectionKind, CollectorError, CpuTimes, IoStats, PackageFilter,
    PerformanceProfiler, ProcStatCollector, ProcessDelta, ProfilerConfig, ProfilerError,
    ResourceStats, SystemDelta, SystemState, UidDelta, UidProcStats, UidStatsCollector,
};
use prometheus::Registry;
use prost::Message;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Default)]
struct FakeSource {
    uid_deltas: Vec<UidDelta>,
    system_delta: SystemDelta,
    fail_uid_stats: bool,
    fail_proc_stat: bool,
    calls: AtomicUsize,
}

impl UidStatsCollector for FakeSource {
    fn delta_stats(&self) -> Result<Vec<UidDelta>, CollectorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_uid_stats {
            return Err(CollectorError::Unavailable("uid_io stats not readable".into()));
        }
        Ok(self.uid_deltas.clone())
    }
}

impl ProcStatCollector for FakeSource {
    fn delta_stats(&self) -> Result<SystemDelta, CollectorError> {
        if self.fail_proc_stat {
            return Err(CollectorError::Unavailable("/proc/stat not readable".into()));
        }
        Ok(self.system_delta)
    }
}

fn process(pid: u32, comm: &str, cpu_time_ms: u64, major_faults: u64) -> ProcessDelta {
    ProcessDelta {
        pid,
        comm: comm.into(),
        start_time: 100,
        cpu_time_ms,
        cpu_cycles: cpu_time_ms * 100,
        major_faults,
        task_count: 2,
        io_blocked_task_count: 1,
    }
}

fn uid_delta(uid: u32, package_name: &str, processes: Vec<ProcessDelta>, io: IoStats) -> UidDelta {
    let proc_stats = UidProcStats {
        cpu_time_ms: processes.iter().map(|p| p.cpu_time_ms).sum(),
        cpu_cycles: processes.iter().map(|p| p.cpu_cycles).sum(),
        total_major_faults: processes.iter().map(|p| p.major_faults).sum(),
        total_task_count: processes.iter().map(|p| p.task_count).sum(),
        io_blocked_task_count: processes.iter().map(|p| p.io_blocked_task_count).sum(),
        processes,
    };
    UidDelta {
        uid,
        package_name: package_name.into(),
        cpu_time_ms: proc_stats.cpu_time_ms,
        io,
        proc_stats,
    }
}

/// Three packages: mount is busy, radio only does I/O, the unresolved UID
/// only faults.
fn source_with_faults(mount_faults: u64) -> FakeSource {
    FakeSource {
        uid_deltas: vec![
            uid_delta(
                1009,
                "mount",
                vec![
                    process(100, "disk I/O", 80, mount_faults),
                    process(101, "mount", 20, 0),
                ],
                IoStats::new(1_000, 0, 300, 0, 2, 0),
            ),
            uid_delta(
                1_010_002,
                "com.google.radio",
                Vec::new(),
                IoStats::new(500, 200, 0, 0, 0, 0),
            ),
            uid_delta(
                1_010_101,
                "",
                vec![process(300, "worker", 0, 40)],
                IoStats::default(),
            ),
        ],
        system_delta: SystemDelta {
            cpu: CpuTimes {
                user: 500,
                system: 200,
                idle: 1_000,
                io_wait: 100,
                ..Default::default()
            },
            context_switches: 5_000,
            runnable_process_count: 10,
            io_blocked_process_count: 2,
        },
        ..Default::default()
    }
}

fn source() -> FakeSource {
    source_with_faults(60)
}

fn epoch(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn profiler(config: ProfilerConfig) -> PerformanceProfiler {
    PerformanceProfiler::new(config).unwrap()
}

fn dump_text(profiler: &PerformanceProfiler) -> String {
    let mut out = Vec::new();
    profiler.on_dump(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn fresh_profiler_dumps_five_empty_sections_in_order() {
    let text = dump_text(&profiler(ProfilerConfig::default()));

    assert_eq!(text.matches(EMPTY_COLLECTION_MESSAGE).count(), 5);
    let positions: Vec<usize> = [
        "Boot-time performance report:",
        "Wake-up performance report:",
        "User-switch events performance report:",
        "Last N minutes performance report:",
        "Custom performance data report:",
    ]
    .iter()
    .map(|title| text.find(title).unwrap())
    .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn dump_renders_ranked_packages() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_periodic_collection(epoch(1_000), SystemState::Normal, &src, &src, None)
        .unwrap();

    let text = dump_text(&profiler);
    assert_eq!(text.matches(EMPTY_COLLECTION_MESSAGE).count(), 4);
    assert!(text.contains("Number of collections: 1"));
    assert!(text.contains("mount"));
    // The unresolved package falls back to its UID.
    assert!(text.contains("1010101"));
}

#[test]
fn each_source_is_sampled_once_per_event() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_wake_up_collection(epoch(10), &src, &src)
        .unwrap();
    profiler
        .on_custom_collection(
            epoch(11),
            SystemState::Garage,
            &PackageFilter::new(),
            &src,
            &src,
            None,
        )
        .unwrap();
    assert_eq!(src.calls.load(Ordering::Relaxed), 2);
}

#[test]
fn proto_dump_decodes_with_intervals() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_boottime_collection(epoch(1_000), &src, &src, None)
        .unwrap();
    profiler
        .on_periodic_collection(epoch(1_060), SystemState::Normal, &src, &src, None)
        .unwrap();
    profiler
        .on_user_switch_collection(epoch(1_061), 0, 10, &src, &src)
        .unwrap();

    let intervals = CollectionIntervals::default();
    let mut buffer = Vec::new();
    profiler.on_dump_proto(&intervals, &mut buffer).unwrap();

    let dump = PerformanceProfilerDump::decode(buffer.as_slice()).unwrap();
    let stats = dump.performance_stats.unwrap();

    let boot = stats.boot_time_stats.unwrap();
    assert_eq!(boot.collection_interval_millis, 1_000);
    assert_eq!(boot.records.len(), 1);
    assert_eq!(boot.records[0].id, 0);

    let periodic = stats.last_n_minutes_stats.unwrap();
    assert_eq!(periodic.collection_interval_millis, 60_000);
    let record = &periodic.records[0];
    let system = record.system_wide_stats.as_ref().unwrap();
    assert_eq!(system.total_cpu_time_millis, 1_800);
    assert_eq!(system.total_context_switches, 5_000);
    assert_eq!(system.total_processes, 12);
    assert_eq!(record.package_cpu_stats[0].user_package_info.as_ref().unwrap().package_name, "mount");

    assert_eq!(stats.user_switch_stats.len(), 1);
    assert!(stats.wake_up_stats.unwrap().records.is_empty());
    assert!(stats.custom_collection_stats.unwrap().records.is_empty());
}

#[test]
fn periodic_collection_drops_oldest_at_capacity() {
    let profiler = profiler(ProfilerConfig {
        periodic_collection_buffer_size: 2,
        ..Default::default()
    });
    let src = source();
    for secs in [60, 120, 180] {
        profiler
            .on_periodic_collection(epoch(secs), SystemState::Normal, &src, &src, None)
            .unwrap();
    }

    let periodic = profiler.periodic_collection();
    assert_eq!(periodic.len(), 2);
    let times: Vec<SystemTime> = periodic.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![epoch(120), epoch(180)]);
}

#[test]
fn periodic_collection_ages_out_system_event_records() {
    let profiler = profiler(ProfilerConfig {
        system_event_data_cache_duration_secs: 100,
        ..Default::default()
    });
    let src = source();
    profiler
        .on_boottime_collection(epoch(1_000), &src, &src, None)
        .unwrap();
    profiler
        .on_wake_up_collection(epoch(1_050), &src, &src)
        .unwrap();
    profiler
        .on_user_switch_collection(epoch(1_000), 0, 10, &src, &src)
        .unwrap();

    // Exactly at the retention boundary everything is kept.
    profiler
        .on_periodic_collection(epoch(1_100), SystemState::Normal, &src, &src, None)
        .unwrap();
    assert_eq!(profiler.boottime_collection().len(), 1);
    assert_eq!(profiler.user_switch_collections().len(), 1);

    profiler
        .on_periodic_collection(epoch(1_101), SystemState::Normal, &src, &src, None)
        .unwrap();
    assert!(profiler.boottime_collection().is_empty());
    assert!(profiler.user_switch_collections().is_empty());
    assert_eq!(profiler.wake_up_collection().len(), 1);
}

#[test]
fn user_switch_sessions_are_bounded() {
    let profiler = profiler(ProfilerConfig {
        max_user_switch_events: 2,
        ..Default::default()
    });
    let src = source();
    profiler
        .on_user_switch_collection(epoch(10), 0, 10, &src, &src)
        .unwrap();
    profiler
        .on_user_switch_collection(epoch(11), 10, 11, &src, &src)
        .unwrap();
    // Same users as the newest session continue it.
    profiler
        .on_user_switch_collection(epoch(12), 10, 11, &src, &src)
        .unwrap();
    profiler
        .on_user_switch_collection(epoch(13), 11, 12, &src, &src)
        .unwrap();

    let sessions = profiler.user_switch_collections();
    assert_eq!(sessions.len(), 2);
    let first = &sessions.sessions()[0];
    assert_eq!((first.from_user, first.to_user), (10, 11));
    assert_eq!(first.collection.len(), 2);
    let last = &sessions.sessions()[1];
    assert_eq!((last.from_user, last.to_user), (11, 12));

    let text = dump_text(&profiler);
    assert!(text.contains("Number of user switch events: 2"));
    assert!(text.contains("From: 10 To: 11"));
}

#[test]
fn system_startup_clears_boot_and_wake_up() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_boottime_collection(epoch(10), &src, &src, None)
        .unwrap();
    profiler
        .on_wake_up_collection(epoch(11), &src, &src)
        .unwrap();
    profiler
        .on_periodic_collection(epoch(12), SystemState::Normal, &src, &src, None)
        .unwrap();

    profiler.on_system_startup();
    assert!(profiler.boottime_collection().is_empty());
    assert!(profiler.wake_up_collection().is_empty());
    assert_eq!(profiler.periodic_collection().len(), 1);
}

#[test]
fn failing_source_appends_nothing() {
    let profiler = profiler(ProfilerConfig::default());

    let src = FakeSource {
        fail_uid_stats: true,
        ..source()
    };
    let err = profiler
        .on_periodic_collection(epoch(10), SystemState::Normal, &src, &src, None)
        .unwrap_err();
    assert!(matches!(
        err,
        ProfilerError::Collector {
            source_name: "UidStatsCollector",
            ..
        }
    ));

    let src = FakeSource {
        fail_proc_stat: true,
        ..source()
    };
    let err = profiler
        .on_boottime_collection(epoch(10), &src, &src, None)
        .unwrap_err();
    assert!(matches!(
        err,
        ProfilerError::Collector {
            source_name: "ProcStatCollector",
            ..
        }
    ));

    for kind in CollectionKind::ALL {
        assert_eq!(profiler.record_count(kind), 0);
    }
}

#[test]
fn failures_are_counted_in_metrics() {
    let registry = Registry::new();
    let profiler = PerformanceProfiler::with_registry(ProfilerConfig::default(), &registry).unwrap();
    let src = FakeSource {
        fail_uid_stats: true,
        ..source()
    };
    let _ = profiler.on_wake_up_collection(epoch(10), &src, &src);

    let families = registry.gather();
    let failures = families
        .iter()
        .find(|f| f.get_name() == "herakles_perf_profiler_collection_failures_total")
        .unwrap();
    assert_eq!(failures.get_metric()[0].get_counter().value(), 1.0);
}

#[test]
fn custom_collection_dump_and_clear() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_custom_collection(
            epoch(10),
            SystemState::Normal,
            &PackageFilter::new(),
            &src,
            &src,
            None,
        )
        .unwrap();

    let mut out = Vec::new();
    profiler.on_custom_collection_dump(Some(&mut out)).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Custom performance data report:"));
    assert!(text.contains("Number of collections: 1"));
    assert!(!text.contains("Boot-time performance report:"));

    profiler.on_custom_collection_dump(None).unwrap();
    assert!(profiler.custom_collection().is_empty());
}

#[test]
fn package_filter_reports_every_match_in_input_order() {
    let profiler = profiler(ProfilerConfig {
        top_n_stats_per_category: 1,
        ..Default::default()
    });
    let src = source();
    let filter: PackageFilter = ["com.google.radio", "mount"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    profiler
        .on_custom_collection(epoch(10), SystemState::Normal, &filter, &src, &src, None)
        .unwrap();

    let custom = profiler.custom_collection();
    let summary = &custom.last().unwrap().aggregate_summary;
    let cpu: Vec<&str> = summary
        .top_n_cpu_times
        .iter()
        .map(|e| e.package_name.as_str())
        .collect();
    // The radio package has no CPU time and is still reported.
    assert_eq!(cpu, vec!["mount", "com.google.radio"]);
    // Totals still cover the filtered-out UID.
    assert_eq!(summary.total_major_faults, 100);
}

#[test]
fn major_fault_change_is_relative_to_same_collection() {
    let profiler = profiler(ProfilerConfig::default());
    let first = source_with_faults(60);
    let second = source_with_faults(160);

    profiler
        .on_periodic_collection(epoch(60), SystemState::Normal, &first, &first, None)
        .unwrap();
    // A wake-up collection in between does not feed the periodic change.
    profiler
        .on_wake_up_collection(epoch(90), &second, &second)
        .unwrap();
    profiler
        .on_periodic_collection(epoch(120), SystemState::Normal, &second, &second, None)
        .unwrap();

    let periodic = profiler.periodic_collection();
    let changes: Vec<f64> = periodic
        .iter()
        .map(|r| r.aggregate_summary.major_faults_percent_change)
        .collect();
    assert_eq!(changes, vec![0.0, 100.0]);
    let wake_up = profiler.wake_up_collection();
    assert_eq!(
        wake_up.last().unwrap().aggregate_summary.major_faults_percent_change,
        0.0
    );
}

#[test]
fn resource_stats_mirror_after_registration() {
    let profiler = profiler(ProfilerConfig {
        sync_resource_usage_stats: true,
        ..Default::default()
    });
    let src = source();
    let mut stats = ResourceStats::default();

    profiler
        .on_boottime_collection(epoch(10), &src, &src, Some(&mut stats))
        .unwrap();
    assert!(stats.resource_usage_stats.is_none());

    profiler.on_watchdog_service_registered();
    profiler
        .on_custom_collection(
            epoch(20),
            SystemState::Normal,
            &PackageFilter::new(),
            &src,
            &src,
            Some(&mut stats),
        )
        .unwrap();

    let usage = stats.resource_usage_stats.unwrap();
    assert_eq!(usage.start_time_epoch_millis, 20_000);
    assert_eq!(usage.duration_millis, 10_000);
    assert_eq!(usage.system_summary_usage_stats.cpu_idle_time_millis, 1_000);
    assert_eq!(usage.uid_resource_usage_stats[0].package_name, "mount");
    assert_eq!(usage.uid_resource_usage_stats[0].user_id, 0);
}

#[test]
fn terminate_drops_every_record() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_boottime_collection(epoch(10), &src, &src, None)
        .unwrap();
    profiler
        .on_periodic_collection(epoch(11), SystemState::Normal, &src, &src, None)
        .unwrap();

    profiler.terminate();
    assert_eq!(dump_text(&profiler).matches(EMPTY_COLLECTION_MESSAGE).count(), 5);
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "dump reader went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failing_dump_sink_reports_error_and_keeps_records() {
    let profiler = profiler(ProfilerConfig::default());
    let src = source();
    profiler
        .on_boottime_collection(epoch(10), &src, &src, None)
        .unwrap();
    profiler
        .on_user_switch_collection(epoch(11), 0, 10, &src, &src)
        .unwrap();
    profiler
        .on_periodic_collection(epoch(12), SystemState::Normal, &src, &src, None)
        .unwrap();
    profiler
        .on_custom_collection(
            epoch(13),
            SystemState::Normal,
            &PackageFilter::new(),
            &src,
            &src,
            None,
        )
        .unwrap();
    let before: Vec<usize> = CollectionKind::ALL
        .iter()
        .map(|kind| profiler.record_count(*kind))
        .collect();

    let err = profiler.on_dump(&mut BrokenPipe).unwrap_err();
    assert!(matches!(err, ProfilerError::Dump { .. }));

    let mut sink = BrokenPipe;
    let err = profiler
        .on_custom_collection_dump(Some(&mut sink))
        .unwrap_err();
    assert!(matches!(err, ProfilerError::Dump { .. }));

    let after: Vec<usize> = CollectionKind::ALL
        .iter()
        .map(|kind| profiler.record_count(*kind))
        .collect();
    assert_eq!(before, after);
    assert_eq!(after, vec![1, 0, 1, 1, 1]);
}

#[test]
fn oversized_counters_saturate_instead_of_failing() {
    let profiler = profiler(ProfilerConfig::default());
    let src = FakeSource {
        system_delta: SystemDelta {
            cpu: CpuTimes {
                user: u64::MAX,
                idle: 1,
                ..Default::default()
            },
            runnable_process_count: u32::MAX,
            io_blocked_process_count: 1,
            ..Default::default()
        },
        ..source()
    };
    profiler
        .on_periodic_collection(epoch(10), SystemState::Normal, &src, &src, None)
        .unwrap();

    let periodic = profiler.periodic_collection();
    let summary = &periodic.last().unwrap().system_summary;
    assert_eq!(summary.total_cpu_time_ms, u64::MAX);
    assert_eq!(summary.total_process_count, u32::MAX);
}
