//! Prometheus self-telemetry of the profiler.
//!
//! Counts collection events and evictions, and mirrors cache occupancy plus
//! the newest periodic record so the profiler can be scraped directly.

use prometheus::{Gauge, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::cache::CollectionKind;
use crate::record::Record;

/// Collection of Prometheus metrics describing the profiler itself.
#[derive(Clone)]
pub struct ProfilerMetrics {
    pub collections_total: IntCounterVec,
    pub collection_failures_total: IntCounterVec,
    pub evicted_records_total: IntCounterVec,
    pub cached_records: IntGaugeVec,
    pub user_switch_sessions: IntGauge,

    // Newest record per collection
    pub latest_total_cpu_time_ms: IntGaugeVec,
    pub latest_total_major_faults: IntGaugeVec,
    pub latest_major_faults_percent_change: GaugeVec,

    // Top-N CPU of the newest periodic record
    pub top_cpu_time_ms: IntGaugeVec,
    pub top_cpu_percent: GaugeVec,

    pub last_collection_timestamp: Gauge,
}

impl ProfilerMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let collections_total = IntCounterVec::new(
            Opts::new(
                "herakles_perf_profiler_collections_total",
                "Collection events processed per event kind",
            ),
            &["event"],
        )?;
        let collection_failures_total = IntCounterVec::new(
            Opts::new(
                "herakles_perf_profiler_collection_failures_total",
                "Collection events aborted by a delta source failure",
            ),
            &["event"],
        )?;
        let evicted_records_total = IntCounterVec::new(
            Opts::new(
                "herakles_perf_profiler_evicted_records_total",
                "Records dropped from a collection by eviction or clearing",
            ),
            &["collection"],
        )?;
        let cached_records = IntGaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_cached_records",
                "Records currently held per collection",
            ),
            &["collection"],
        )?;
        let user_switch_sessions = IntGauge::new(
            "herakles_perf_profiler_user_switch_sessions",
            "Open user-switch sessions",
        )?;

        let latest_total_cpu_time_ms = IntGaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_latest_total_cpu_time_ms",
                "Total CPU time over all UIDs in the newest record",
            ),
            &["collection"],
        )?;
        let latest_total_major_faults = IntGaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_latest_total_major_faults",
                "Total major page faults in the newest record",
            ),
            &["collection"],
        )?;
        let latest_major_faults_percent_change = GaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_latest_major_faults_percent_change",
                "Major page fault change against the previous record in percent",
            ),
            &["collection"],
        )?;

        let top_cpu_time_ms = IntGaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_top_cpu_time_ms",
                "Top-N packages by CPU time in the newest periodic record",
            ),
            &["rank", "uid", "package"],
        )?;
        let top_cpu_percent = GaugeVec::new(
            Opts::new(
                "herakles_perf_profiler_top_cpu_percent",
                "Share of total CPU time of the Top-N packages in percent",
            ),
            &["rank", "uid", "package"],
        )?;

        let last_collection_timestamp = Gauge::new(
            "herakles_perf_profiler_last_collection_timestamp_seconds",
            "Unix time of the last successful collection",
        )?;

        registry.register(Box::new(collections_total.clone()))?;
        registry.register(Box::new(collection_failures_total.clone()))?;
        registry.register(Box::new(evicted_records_total.clone()))?;
        registry.register(Box::new(cached_records.clone()))?;
        registry.register(Box::new(user_switch_sessions.clone()))?;
        registry.register(Box::new(latest_total_cpu_time_ms.clone()))?;
        registry.register(Box::new(latest_total_major_faults.clone()))?;
        registry.register(Box::new(latest_major_faults_percent_change.clone()))?;
        registry.register(Box::new(top_cpu_time_ms.clone()))?;
        registry.register(Box::new(top_cpu_percent.clone()))?;
        registry.register(Box::new(last_collection_timestamp.clone()))?;

        Ok(Self {
            collections_total,
            collection_failures_total,
            evicted_records_total,
            cached_records,
            user_switch_sessions,
            latest_total_cpu_time_ms,
            latest_total_major_faults,
            latest_major_faults_percent_change,
            top_cpu_time_ms,
            top_cpu_percent,
            last_collection_timestamp,
        })
    }

    pub fn record_failure(&self, kind: CollectionKind) {
        self.collection_failures_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_evictions(&self, kind: CollectionKind, evicted: usize) {
        if evicted > 0 {
            self.evicted_records_total
                .with_label_values(&[kind.as_str()])
                .inc_by(evicted as u64);
        }
    }

    pub fn set_cached_records(&self, kind: CollectionKind, count: usize) {
        self.cached_records
            .with_label_values(&[kind.as_str()])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Publishes the record just appended to `kind`.
    pub fn record_collection(&self, kind: CollectionKind, record: &Record) {
        let label = &[kind.as_str()];
        let aggregate = &record.aggregate_summary;

        self.collections_total.with_label_values(label).inc();
        self.latest_total_cpu_time_ms
            .with_label_values(label)
            .set(gauge_value(aggregate.total_cpu_time_ms));
        self.latest_total_major_faults
            .with_label_values(label)
            .set(gauge_value(aggregate.total_major_faults));
        self.latest_major_faults_percent_change
            .with_label_values(label)
            .set(aggregate.major_faults_percent_change);

        if let Ok(since_epoch) = record.time.duration_since(std::time::UNIX_EPOCH) {
            self.last_collection_timestamp
                .set(since_epoch.as_secs_f64());
        }

        if kind == CollectionKind::Periodic {
            self.set_top_cpu(record);
        }
    }

    fn set_top_cpu(&self, record: &Record) {
        self.top_cpu_time_ms.reset();
        self.top_cpu_percent.reset();

        let total = record.aggregate_summary.total_cpu_time_ms;
        for (rank, entry) in record.aggregate_summary.top_n_cpu_times.iter().enumerate() {
            let Some(cpu) = entry.as_cpu() else {
                continue;
            };
            let rank = (rank + 1).to_string();
            let uid = entry.uid.to_string();
            let labels = &[rank.as_str(), uid.as_str(), entry.package_name.as_str()];
            self.top_cpu_time_ms
                .with_label_values(labels)
                .set(gauge_value(cpu.cpu_time_ms));
            self.top_cpu_percent
                .with_label_values(labels)
                .set(crate::record::percentage(cpu.cpu_time_ms, total));
        }
    }
}

/// Integer gauges are signed; counters above `i64::MAX` clamp.
fn gauge_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
