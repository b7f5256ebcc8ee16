//! Check command implementation.
//!
//! Validates the effective configuration and, optionally, a replay file.

use herakles_perf_profiler::{
    load_replay_data, PerformanceProfiler, ProfilerConfig, ReplaySource, ResourceStats,
};
use std::path::Path;
use std::time::SystemTime;

/// Validates configuration and replay input, exiting with code 1 on failure.
pub fn command_check(
    replay: Option<&Path>,
    config: &ProfilerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Performance Profiler - Check");
    println!("========================================");

    let all_ok = run_checks(replay, config);

    println!();
    if all_ok {
        println!("✅ All checks passed");
        Ok(())
    } else {
        println!("❌ Some checks failed");
        std::process::exit(1);
    }
}

/// Runs every check and prints one line per result.
pub fn run_checks(replay: Option<&Path>, config: &ProfilerConfig) -> bool {
    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match config.validate() {
        Ok(()) => {
            println!("   ✅ Configuration is valid");
            println!(
                "   ✅ Top-N: {} packages per category, {} processes per package",
                config.top_n_stats_per_category, config.top_n_stats_per_subcategory
            );
            println!(
                "   ✅ Caches: {} periodic records, {} user-switch sessions, {}s retention",
                config.periodic_collection_buffer_size,
                config.max_user_switch_events,
                config.system_event_data_cache_duration_secs
            );
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    let Some(path) = replay else {
        return all_ok;
    };

    println!("\n📁 Checking replay file {}...", path.display());
    let data = match load_replay_data(path) {
        Ok(data) => {
            println!("   ✅ Loaded {} samples", data.samples.len());
            data
        }
        Err(e) => {
            println!("   ❌ {}", e);
            return false;
        }
    };

    let profiler = match PerformanceProfiler::new(config.clone()) {
        Ok(profiler) => profiler,
        Err(e) => {
            println!("   ❌ Cannot create profiler: {}", e);
            return false;
        }
    };
    profiler.set_send_resource_usage_stats(true);

    let source = ReplaySource::new(data);
    let mut stats = ResourceStats::default();
    match profiler.on_boottime_collection(SystemTime::now(), &source, &source, Some(&mut stats)) {
        Ok(()) => {
            let packages = stats
                .resource_usage_stats
                .map(|s| s.uid_resource_usage_stats.len())
                .unwrap_or_default();
            println!("   ✅ Test collection ranked {} packages", packages);
        }
        Err(e) => {
            println!("   ❌ Test collection failed: {}", e);
            all_ok = false;
        }
    }

    all_ok
}
