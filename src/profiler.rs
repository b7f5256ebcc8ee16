//! Profiler façade driven by the watchdog's collection events.
//!
//! Each collection handler samples both delta sources outside the lock, then
//! ranks and appends under a single mutex guarding every cache. Dumps render
//! under the same lock and write to the sink after releasing it.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use prometheus::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::{Collection, CollectionKind, UserSwitchCollections};
use crate::collector::{ProcStatCollector, SystemDelta, UidDelta, UidStatsCollector};
use crate::config::{CollectionIntervals, ProfilerConfig};
use crate::dump;
use crate::error::{ProfilerError, Result};
use crate::metrics::ProfilerMetrics;
use crate::proto::{self, PerformanceProfilerDump, PerformanceStats};
use crate::ranking::{self, PackageFilter, TopN};
use crate::record::Record;
use crate::resource_stats::{ResourceStats, ResourceUsageStats};

const PROFILER_NAME: &str = "PerformanceProfiler";

/// Power/operating mode reported alongside periodic and custom collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    #[default]
    Normal,
    Garage,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemState::Normal => f.write_str("normal"),
            SystemState::Garage => f.write_str("garage"),
        }
    }
}

/// Cache a collection event appends to.
#[derive(Debug, Clone, Copy)]
enum Target {
    BootTime,
    WakeUp,
    Periodic,
    Custom,
    UserSwitch { from_user: u32, to_user: u32 },
}

impl Target {
    fn kind(&self) -> CollectionKind {
        match self {
            Target::BootTime => CollectionKind::BootTime,
            Target::WakeUp => CollectionKind::WakeUp,
            Target::Periodic => CollectionKind::Periodic,
            Target::Custom => CollectionKind::Custom,
            Target::UserSwitch { .. } => CollectionKind::UserSwitch,
        }
    }
}

struct Caches {
    boottime: Collection,
    wake_up: Collection,
    periodic: Collection,
    custom: Collection,
    user_switch: UserSwitchCollections,
    send_resource_usage_stats: bool,
}

impl Caches {
    fn new(config: &ProfilerConfig) -> Self {
        Self {
            boottime: Collection::time_window(config.retention()),
            wake_up: Collection::time_window(config.retention()),
            periodic: Collection::fifo(config.periodic_collection_buffer_size),
            custom: Collection::unbounded(),
            user_switch: UserSwitchCollections::new(
                config.max_user_switch_events,
                config.retention(),
            ),
            send_resource_usage_stats: false,
        }
    }

    fn record_count(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::BootTime => self.boottime.len(),
            CollectionKind::WakeUp => self.wake_up.len(),
            CollectionKind::Periodic => self.periodic.len(),
            CollectionKind::Custom => self.custom.len(),
            CollectionKind::UserSwitch => self.user_switch.record_count(),
        }
    }
}

/// Resource-usage profiler keeping per-event Top-N records.
pub struct PerformanceProfiler {
    config: ProfilerConfig,
    top_n: TopN,
    caches: Mutex<Caches>,
    metrics: Option<ProfilerMetrics>,
}

impl PerformanceProfiler {
    /// Creates a profiler without self-telemetry.
    pub fn new(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        let caches = Caches::new(&config);
        Ok(Self {
            top_n: config.top_n(),
            caches: Mutex::new(caches),
            config,
            metrics: None,
        })
    }

    /// Creates a profiler whose metrics are registered on `registry`.
    pub fn with_registry(config: ProfilerConfig, registry: &Registry) -> Result<Self> {
        let mut profiler = Self::new(config)?;
        profiler.metrics = Some(ProfilerMetrics::new(registry)?);
        Ok(profiler)
    }

    pub fn name(&self) -> &'static str {
        PROFILER_NAME
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Caches> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops every cached record.
    pub fn terminate(&self) {
        warn!("Terminating {}", self.name());
        let mut caches = self.lock();
        for (kind, cleared) in [
            (CollectionKind::BootTime, caches.boottime.clear()),
            (CollectionKind::WakeUp, caches.wake_up.clear()),
            (CollectionKind::Periodic, caches.periodic.clear()),
            (CollectionKind::Custom, caches.custom.clear()),
            (CollectionKind::UserSwitch, caches.user_switch.clear()),
        ] {
            self.record_evictions(kind, cleared);
        }
        self.publish_occupancy(&caches);
    }

    /// Starts mirroring resource usage when the configuration allows it.
    pub fn on_watchdog_service_registered(&self) {
        let mut caches = self.lock();
        caches.send_resource_usage_stats = self.config.sync_resource_usage_stats;
        info!(
            enabled = caches.send_resource_usage_stats,
            "Watchdog service registered, resource usage stats syncing updated"
        );
    }

    /// Forces resource-usage mirroring on or off.
    pub fn set_send_resource_usage_stats(&self, enabled: bool) {
        self.lock().send_resource_usage_stats = enabled;
    }

    /// Clears the boot-time and wake-up caches at the start of a boot cycle.
    pub fn on_system_startup(&self) {
        let mut caches = self.lock();
        let boottime = caches.boottime.clear();
        let wake_up = caches.wake_up.clear();
        info!(
            boottime_records = boottime,
            wake_up_records = wake_up,
            "System startup, cleared boot-time and wake-up collections"
        );
        self.record_evictions(CollectionKind::BootTime, boottime);
        self.record_evictions(CollectionKind::WakeUp, wake_up);
        self.publish_occupancy(&caches);
    }

    #[instrument(skip(self, uid_stats, proc_stat, resource_stats))]
    pub fn on_boottime_collection(
        &self,
        now: SystemTime,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
        resource_stats: Option<&mut ResourceStats>,
    ) -> Result<()> {
        self.process(
            Target::BootTime,
            now,
            SystemState::Normal,
            &PackageFilter::new(),
            uid_stats,
            proc_stat,
            resource_stats,
        )
    }

    #[instrument(skip(self, uid_stats, proc_stat))]
    pub fn on_wake_up_collection(
        &self,
        now: SystemTime,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
    ) -> Result<()> {
        self.process(
            Target::WakeUp,
            now,
            SystemState::Normal,
            &PackageFilter::new(),
            uid_stats,
            proc_stat,
            None,
        )
    }

    /// Appends to the periodic cache and ages out the boot-time, wake-up
    /// and user-switch caches.
    #[instrument(skip(self, uid_stats, proc_stat, resource_stats))]
    pub fn on_periodic_collection(
        &self,
        now: SystemTime,
        system_state: SystemState,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
        resource_stats: Option<&mut ResourceStats>,
    ) -> Result<()> {
        self.process(
            Target::Periodic,
            now,
            system_state,
            &PackageFilter::new(),
            uid_stats,
            proc_stat,
            resource_stats,
        )
    }

    #[instrument(skip(self, uid_stats, proc_stat))]
    pub fn on_user_switch_collection(
        &self,
        now: SystemTime,
        from_user: u32,
        to_user: u32,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
    ) -> Result<()> {
        self.process(
            Target::UserSwitch { from_user, to_user },
            now,
            SystemState::Normal,
            &PackageFilter::new(),
            uid_stats,
            proc_stat,
            None,
        )
    }

    /// Appends to the custom cache. A non-empty `package_filter` reports
    /// every matching package instead of the Top-N.
    #[instrument(skip(self, uid_stats, proc_stat, resource_stats))]
    pub fn on_custom_collection(
        &self,
        now: SystemTime,
        system_state: SystemState,
        package_filter: &PackageFilter,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
        resource_stats: Option<&mut ResourceStats>,
    ) -> Result<()> {
        self.process(
            Target::Custom,
            now,
            system_state,
            package_filter,
            uid_stats,
            proc_stat,
            resource_stats,
        )
    }

    fn sample(
        &self,
        kind: CollectionKind,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
    ) -> Result<(Vec<UidDelta>, SystemDelta)> {
        let uid_deltas = uid_stats.delta_stats().map_err(|source| {
            warn!(event = %kind, error = %source, "UidStatsCollector failed");
            ProfilerError::Collector {
                source_name: "UidStatsCollector",
                source,
            }
        });
        let uid_deltas = match uid_deltas {
            Ok(deltas) => deltas,
            Err(e) => {
                self.record_failure(kind);
                return Err(e);
            }
        };

        match proc_stat.delta_stats() {
            Ok(system_delta) => Ok((uid_deltas, system_delta)),
            Err(source) => {
                warn!(event = %kind, error = %source, "ProcStatCollector failed");
                self.record_failure(kind);
                Err(ProfilerError::Collector {
                    source_name: "ProcStatCollector",
                    source,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        target: Target,
        now: SystemTime,
        system_state: SystemState,
        package_filter: &PackageFilter,
        uid_stats: &dyn UidStatsCollector,
        proc_stat: &dyn ProcStatCollector,
        resource_stats: Option<&mut ResourceStats>,
    ) -> Result<()> {
        let kind = target.kind();
        let (uid_deltas, system_delta) = self.sample(kind, uid_stats, proc_stat)?;

        let mut caches = self.lock();

        if let Target::Periodic = target {
            self.sweep_system_event_collections(&mut caches, now);
        }

        let previous = match target {
            Target::BootTime => caches.boottime.last(),
            Target::WakeUp => caches.wake_up.last(),
            Target::Periodic => caches.periodic.last(),
            Target::Custom => caches.custom.last(),
            Target::UserSwitch { from_user, to_user } => {
                caches.user_switch.previous(from_user, to_user)
            }
        };
        let record = ranking::compute(
            now,
            &uid_deltas,
            &system_delta,
            self.top_n,
            package_filter,
            previous,
        );

        if let Some(out) = resource_stats {
            if caches.send_resource_usage_stats {
                let interval = self.interval_millis(kind);
                out.resource_usage_stats = Some(ResourceUsageStats::from_record(&record, interval));
            }
        }
        self.record_collection(kind, &record);

        let evicted = match target {
            Target::BootTime => caches.boottime.append(record, now),
            Target::WakeUp => caches.wake_up.append(record, now),
            Target::Periodic => caches.periodic.append(record, now),
            Target::Custom => caches.custom.append(record, now),
            Target::UserSwitch { from_user, to_user } => {
                let outcome = caches.user_switch.append(from_user, to_user, record, now);
                if outcome.new_session {
                    info!(from_user, to_user, "Opened user-switch session");
                }
                if outcome.session_evicted {
                    debug!(
                        records = outcome.evicted_session_records,
                        "Evicted oldest user-switch session"
                    );
                }
                outcome.evicted_records + outcome.evicted_session_records
            }
        };
        self.record_evictions(kind, evicted);

        debug!(
            event = %kind,
            state = %system_state,
            uids = uid_deltas.len(),
            records = caches.record_count(kind),
            evicted,
            "Collection recorded"
        );
        self.publish_occupancy(&caches);
        Ok(())
    }

    fn sweep_system_event_collections(&self, caches: &mut Caches, now: SystemTime) {
        let boottime = caches.boottime.sweep(now);
        let wake_up = caches.wake_up.sweep(now);
        let user_switch = caches.user_switch.sweep(now);
        if boottime + wake_up + user_switch > 0 {
            debug!(
                boottime,
                wake_up, user_switch, "Aged out system event collections"
            );
        }
        self.record_evictions(CollectionKind::BootTime, boottime);
        self.record_evictions(CollectionKind::WakeUp, wake_up);
        self.record_evictions(CollectionKind::UserSwitch, user_switch);
    }

    fn interval_millis(&self, kind: CollectionKind) -> u64 {
        interval_for(&self.config.collection_intervals, kind)
    }

    /// Writes the boot-time, wake-up, user-switch, periodic and custom
    /// reports to `out`.
    pub fn on_dump(&self, out: &mut dyn Write) -> Result<()> {
        let report = {
            let caches = self.lock();
            let mut report = String::new();
            dump::render_collection_section(&mut report, CollectionKind::BootTime, &caches.boottime);
            dump::render_collection_section(&mut report, CollectionKind::WakeUp, &caches.wake_up);
            dump::render_user_switch_section(&mut report, &caches.user_switch);
            dump::render_collection_section(&mut report, CollectionKind::Periodic, &caches.periodic);
            dump::render_collection_section(&mut report, CollectionKind::Custom, &caches.custom);
            report
        };
        out.write_all(report.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ProfilerError::dump("performance", e))
    }

    /// Writes the custom report to `out`, or clears the custom cache when
    /// `out` is `None`.
    pub fn on_custom_collection_dump(&self, out: Option<&mut dyn Write>) -> Result<()> {
        let Some(out) = out else {
            let mut caches = self.lock();
            let cleared = caches.custom.clear();
            info!(records = cleared, "Custom collection ended, cleared its cache");
            self.record_evictions(CollectionKind::Custom, cleared);
            self.publish_occupancy(&caches);
            return Ok(());
        };

        let report = {
            let caches = self.lock();
            let mut report = String::new();
            dump::render_collection_section(&mut report, CollectionKind::Custom, &caches.custom);
            report
        };
        out.write_all(report.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ProfilerError::dump("custom collection", e))
    }

    /// Structured dump of every cache with its sampling interval.
    pub fn dump_proto(&self, intervals: &CollectionIntervals) -> PerformanceProfilerDump {
        let caches = self.lock();
        let performance_stats = PerformanceStats {
            boot_time_stats: Some(proto::stats_collection(
                &caches.boottime,
                intervals.boottime_interval_millis,
            )),
            wake_up_stats: Some(proto::stats_collection(
                &caches.wake_up,
                intervals.wake_up_interval_millis,
            )),
            user_switch_stats: caches
                .user_switch
                .sessions()
                .iter()
                .map(|s| {
                    proto::stats_collection(&s.collection, intervals.user_switch_interval_millis)
                })
                .collect(),
            last_n_minutes_stats: Some(proto::stats_collection(
                &caches.periodic,
                intervals.periodic_interval_millis,
            )),
            custom_collection_stats: Some(proto::stats_collection(
                &caches.custom,
                intervals.custom_interval_millis,
            )),
        };
        PerformanceProfilerDump {
            performance_stats: Some(performance_stats),
        }
    }

    /// Encodes [`Self::dump_proto`] into `out`.
    pub fn on_dump_proto(&self, intervals: &CollectionIntervals, out: &mut Vec<u8>) -> Result<()> {
        use prost::Message;

        let dump = self.dump_proto(intervals);
        dump.encode(out)?;
        Ok(())
    }

    pub fn boottime_collection(&self) -> Collection {
        self.lock().boottime.clone()
    }

    pub fn wake_up_collection(&self) -> Collection {
        self.lock().wake_up.clone()
    }

    pub fn periodic_collection(&self) -> Collection {
        self.lock().periodic.clone()
    }

    pub fn custom_collection(&self) -> Collection {
        self.lock().custom.clone()
    }

    pub fn user_switch_collections(&self) -> UserSwitchCollections {
        self.lock().user_switch.clone()
    }

    /// Number of records held for `kind`, summed over sessions for user switches.
    pub fn record_count(&self, kind: CollectionKind) -> usize {
        self.lock().record_count(kind)
    }

    /// Newest periodic record, if any.
    pub fn latest_periodic_record(&self) -> Option<Record> {
        self.lock().periodic.last().cloned()
    }

    fn record_failure(&self, kind: CollectionKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(kind);
        }
    }

    fn record_evictions(&self, kind: CollectionKind, evicted: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_evictions(kind, evicted);
        }
    }

    fn record_collection(&self, kind: CollectionKind, record: &Record) {
        if let Some(metrics) = &self.metrics {
            metrics.record_collection(kind, record);
        }
    }

    fn publish_occupancy(&self, caches: &Caches) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        for kind in CollectionKind::ALL {
            metrics.set_cached_records(kind, caches.record_count(kind));
        }
        metrics
            .user_switch_sessions
            .set(caches.user_switch.len() as i64);
    }
}

/// Configured sampling interval of a collection kind in milliseconds.
pub fn interval_for(intervals: &CollectionIntervals, kind: CollectionKind) -> u64 {
    match kind {
        CollectionKind::BootTime => intervals.boottime_interval_millis,
        CollectionKind::WakeUp => intervals.wake_up_interval_millis,
        CollectionKind::UserSwitch => intervals.user_switch_interval_millis,
        CollectionKind::Periodic => intervals.periodic_interval_millis,
        CollectionKind::Custom => intervals.custom_interval_millis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectorError;

    struct EmptySource;

    impl UidStatsCollector for EmptySource {
        fn delta_stats(&self) -> std::result::Result<Vec<UidDelta>, CollectorError> {
            Ok(Vec::new())
        }
    }

    impl ProcStatCollector for EmptySource {
        fn delta_stats(&self) -> std::result::Result<SystemDelta, CollectorError> {
            Ok(SystemDelta::default())
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ProfilerConfig {
            top_n_stats_per_subcategory: 0,
            ..Default::default()
        };
        assert!(matches!(
            PerformanceProfiler::new(config),
            Err(ProfilerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_name() {
        let profiler = PerformanceProfiler::new(ProfilerConfig::default()).unwrap();
        assert_eq!(profiler.name(), "PerformanceProfiler");
    }

    #[test]
    fn test_resource_stats_untouched_until_registered() {
        let config = ProfilerConfig {
            sync_resource_usage_stats: true,
            ..Default::default()
        };
        let profiler = PerformanceProfiler::new(config).unwrap();
        let now = SystemTime::now();

        let mut stats = ResourceStats::default();
        profiler
            .on_boottime_collection(now, &EmptySource, &EmptySource, Some(&mut stats))
            .unwrap();
        assert!(stats.resource_usage_stats.is_none());

        profiler.on_watchdog_service_registered();
        profiler
            .on_periodic_collection(
                now,
                SystemState::Normal,
                &EmptySource,
                &EmptySource,
                Some(&mut stats),
            )
            .unwrap();
        let usage = stats.resource_usage_stats.unwrap();
        assert_eq!(usage.duration_millis, 60_000);
    }

    #[test]
    fn test_terminate_clears_everything() {
        let registry = Registry::new();
        let profiler =
            PerformanceProfiler::with_registry(ProfilerConfig::default(), &registry).unwrap();
        let now = SystemTime::now();
        profiler
            .on_boottime_collection(now, &EmptySource, &EmptySource, None)
            .unwrap();
        profiler
            .on_user_switch_collection(now, 0, 10, &EmptySource, &EmptySource)
            .unwrap();
        profiler
            .on_custom_collection(
                now,
                SystemState::Garage,
                &PackageFilter::new(),
                &EmptySource,
                &EmptySource,
                None,
            )
            .unwrap();

        profiler.terminate();
        assert!(profiler.boottime_collection().is_empty());
        assert!(profiler.custom_collection().is_empty());
        assert!(profiler.user_switch_collections().is_empty());
        for kind in CollectionKind::ALL {
            assert_eq!(profiler.record_count(kind), 0);
        }
    }

    #[test]
    fn test_interval_for_each_kind() {
        let intervals = CollectionIntervals::default();
        assert_eq!(interval_for(&intervals, CollectionKind::BootTime), 1_000);
        assert_eq!(interval_for(&intervals, CollectionKind::Custom), 10_000);
    }
}
