//! Generate testdata command implementation.
//!
//! Generates synthetic replay files for exercising the profiler without
//! live collectors.

use chrono::Utc;
use herakles_perf_profiler::{
    CpuTimes, IoStats, ProcessDelta, ReplayData, ReplaySample, SystemDelta, UidDelta,
    UidProcStats,
};
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Package names assigned to generated UIDs, in UID order.
const PACKAGE_NAMES: &[&str] = &[
    "system",
    "mount",
    "com.google.android.car.kitchensink",
    "com.android.car.carlauncher",
    "com.google.android.apps.maps",
    "com.android.systemui",
    "com.google.radio",
    "com.android.bluetooth",
    "com.android.car.media",
    "com.google.android.gms",
];

/// Process names used for generated processes.
const PROCESS_NAMES: &[&str] = &[
    "init", "logd", "surfaceflinger", "audioserver", "cameraserver", "mediaserver",
    "binder:worker", "RenderThread", "HeapTaskDaemon", "kworker",
];

const FIRST_APP_UID: u32 = 10_000;

/// Generates a synthetic replay file for testing purposes.
pub fn command_generate_testdata(
    output: PathBuf,
    samples: usize,
    uids: usize,
    processes_per_uid: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!(
        "Generating replay data: samples={}, uids={}, processes_per_uid={}, output={}",
        samples,
        uids,
        processes_per_uid,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let data = generate_replay_data(&mut rng, samples, uids, processes_per_uid);

    // Write to file as pretty-printed JSON
    let json_content = serde_json::to_string_pretty(&data)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated replay data: {} samples x {} UIDs in {}",
        data.samples.len(),
        uids,
        output.display()
    );

    Ok(())
}

/// Builds `samples` intervals of random deltas for `uids` UIDs.
pub fn generate_replay_data(
    rng: &mut impl Rng,
    samples: usize,
    uids: usize,
    processes_per_uid: usize,
) -> ReplayData {
    let mut next_pid: u32 = 1000;
    let samples = (0..samples)
        .map(|_| generate_sample(rng, uids, processes_per_uid, &mut next_pid))
        .collect();

    ReplayData {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        samples,
    }
}

fn generate_sample(
    rng: &mut impl Rng,
    uids: usize,
    processes_per_uid: usize,
    next_pid: &mut u32,
) -> ReplaySample {
    let mut uid_deltas = Vec::with_capacity(uids);
    let mut io_blocked_process_count = 0;
    let mut runnable_process_count = 0;

    for i in 0..uids {
        let delta = generate_uid_delta(rng, i, processes_per_uid, next_pid);
        io_blocked_process_count += delta.proc_stats.io_blocked_task_count;
        runnable_process_count +=
            delta.proc_stats.total_task_count - delta.proc_stats.io_blocked_task_count;
        uid_deltas.push(delta);
    }

    let cpu = CpuTimes {
        user: rng.gen_range(1_000..20_000),
        nice: rng.gen_range(0..2_000),
        system: rng.gen_range(500..10_000),
        idle: rng.gen_range(10_000..100_000),
        io_wait: rng.gen_range(0..5_000),
        irq: rng.gen_range(0..1_000),
        soft_irq: rng.gen_range(0..1_000),
        steal: 0,
        guest: 0,
        guest_nice: 0,
    };

    ReplaySample {
        uid_deltas,
        system_delta: SystemDelta {
            cpu,
            context_switches: rng.gen_range(10_000..1_000_000),
            runnable_process_count,
            io_blocked_process_count,
        },
    }
}

fn generate_uid_delta(
    rng: &mut impl Rng,
    index: usize,
    processes_per_uid: usize,
    next_pid: &mut u32,
) -> UidDelta {
    let uid = match index {
        0 => 1000,
        1 => 1009,
        n => FIRST_APP_UID + n as u32,
    };
    // Every seventh UID has no resolvable package.
    let package_name = if index > 1 && index % 7 == 0 {
        String::new()
    } else {
        PACKAGE_NAMES[index % PACKAGE_NAMES.len()].to_string()
    };

    let process_count = if processes_per_uid == 0 {
        0
    } else {
        rng.gen_range(1..=processes_per_uid)
    };
    let processes: Vec<ProcessDelta> = (0..process_count)
        .map(|_| {
            let pid = *next_pid;
            *next_pid += 1;
            let task_count = rng.gen_range(1..8);
            ProcessDelta {
                pid,
                comm: PROCESS_NAMES[rng.gen_range(0..PROCESS_NAMES.len())].to_string(),
                start_time: rng.gen_range(0..100_000),
                cpu_time_ms: rng.gen_range(0..5_000),
                cpu_cycles: rng.gen_range(0..10_000_000),
                major_faults: rng.gen_range(0..20_000),
                task_count,
                io_blocked_task_count: rng.gen_range(0..=task_count),
            }
        })
        .collect();

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
        package_name,
        cpu_time_ms: proc_stats.cpu_time_ms,
        io: IoStats::new(
            rng.gen_range(0..50_000_000),
            rng.gen_range(0..10_000_000),
            rng.gen_range(0..20_000_000),
            rng.gen_range(0..5_000_000),
            rng.gen_range(0..200),
            rng.gen_range(0..50),
        ),
        proc_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_data_is_consistent() {
        let mut rng = rand::thread_rng();
        let data = generate_replay_data(&mut rng, 3, 9, 4);

        assert_eq!(data.samples.len(), 3);
        for sample in &data.samples {
            assert_eq!(sample.uid_deltas.len(), 9);
            assert_eq!(sample.uid_deltas[1].uid, 1009);
            assert!(sample.uid_deltas[7].package_name.is_empty());
            for delta in &sample.uid_deltas {
                let stats = &delta.proc_stats;
                assert!((1..=4).contains(&stats.processes.len()));
                assert!(stats.io_blocked_task_count <= stats.total_task_count);
                assert_eq!(delta.cpu_time_ms, stats.cpu_time_ms);
            }
            let tasks: u32 = sample
                .uid_deltas
                .iter()
                .map(|d| d.proc_stats.total_task_count)
                .sum();
            assert_eq!(sample.system_delta.total_process_count(), tasks);
        }
    }

    #[test]
    fn test_command_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");
        command_generate_testdata(path.clone(), 2, 5, 2).unwrap();

        let loaded = herakles_perf_profiler::load_replay_data(&path).unwrap();
        assert_eq!(loaded.samples.len(), 2);
        assert_eq!(loaded.version, "1.0");
    }
}
