//! Replay command implementation.
//!
//! Feeds a recorded replay file through the profiler the way the watchdog
//! drives it at runtime, then prints the text dump and optionally writes the
//! protobuf dump.

use herakles_perf_profiler::{
    load_replay_data, parse_package_filter, PackageFilter, PerformanceProfiler, ProfilerConfig,
    ReplayData, ReplaySource, SystemState,
};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// How the replayed samples are dispatched to the profiler.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    /// Packages for custom collections; empty runs no custom collection.
    pub packages: PackageFilter,
    /// Users switched before the last sample.
    pub user_switch: Option<(u32, u32)>,
}

impl ReplayPlan {
    pub fn parse(
        packages: Option<&str>,
        user_switch: Option<&str>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let packages = packages.map(parse_package_filter).unwrap_or_default();

        let user_switch = match user_switch {
            Some(pair) => {
                let (from, to) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("invalid user switch '{}', expected FROM:TO", pair))?;
                Some((from.trim().parse()?, to.trim().parse()?))
            }
            None => None,
        };

        Ok(Self {
            packages,
            user_switch,
        })
    }
}

/// Runs a replay file through the profiler and prints the dump.
pub fn command_replay(
    file: PathBuf,
    proto_output: Option<PathBuf>,
    packages: Option<String>,
    user_switch: Option<String>,
    config: &ProfilerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = ReplayPlan::parse(packages.as_deref(), user_switch.as_deref())?;
    let data = load_replay_data(&file)?;
    let profiler = run_replay(config, data, &plan, SystemTime::now())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    profiler.on_dump(&mut out)?;
    out.flush()?;

    if let Some(path) = proto_output {
        let mut buffer = Vec::new();
        profiler.on_dump_proto(&config.collection_intervals, &mut buffer)?;
        fs::write(&path, &buffer)?;
        eprintln!(
            "✅ Protobuf dump written to: {} ({} bytes)",
            path.display(),
            buffer.len()
        );
    }

    Ok(())
}

/// Replays `data` starting at `start`.
///
/// The first sample becomes the boot-time collection. Every later sample is
/// a periodic collection spaced by the configured sample interval, followed
/// by a custom collection when the plan names packages. The user switch, if
/// any, is collected from the last sample before its periodic collection.
pub fn run_replay(
    config: &ProfilerConfig,
    data: ReplayData,
    plan: &ReplayPlan,
    start: SystemTime,
) -> Result<PerformanceProfiler, Box<dyn std::error::Error>> {
    let profiler = PerformanceProfiler::new(config.clone())?;
    let source = ReplaySource::new(data);
    if source.is_empty() {
        return Err("replay file contains no samples".into());
    }

    info!("Replaying {} samples", source.len());
    let step = Duration::from_secs(config.sample_interval_secs);

    profiler.on_system_startup();
    profiler.on_boottime_collection(start, &source, &source, None)?;
    profiler.on_watchdog_service_registered();

    let mut now = start;
    for index in 1..source.len() {
        source.advance();
        now += step;
        debug!(sample = index, "Replaying sample");

        if index + 1 == source.len() {
            if let Some((from_user, to_user)) = plan.user_switch {
                profiler.on_user_switch_collection(now, from_user, to_user, &source, &source)?;
            }
        }

        profiler.on_periodic_collection(now, SystemState::Normal, &source, &source, None)?;

        if !plan.packages.is_empty() {
            profiler.on_custom_collection(
                now,
                SystemState::Normal,
                &plan.packages,
                &source,
                &source,
                None,
            )?;
        }
    }

    Ok(profiler)
}
