//! HTTP server mode.
//!
//! Drives the profiler the way the watchdog does at runtime: startup and a
//! boot-time collection, then periodic collections on an interval, with the
//! dumps served over HTTP.

use axum::{
    routing::{get, post},
    Router,
};
use herakles_perf_profiler::{
    load_replay_data, PerformanceProfiler, ProfilerConfig, ReplayData, ReplaySource,
    ResourceStats, SystemState,
};
use prometheus::{Gauge, Opts, Registry};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::{
    net::TcpListener,
    signal,
    sync::RwLock,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::commands::generate::generate_replay_data;
use crate::handlers::{
    custom_dump_handler, custom_handler, dump_handler, end_custom_handler, health_handler,
    metrics_handler, proto_dump_handler, resource_usage_handler, user_switch_handler,
    wake_up_handler,
};
use crate::state::{AppState, CollectionStatus, SharedState};

/// Intervals of synthetic data served when no replay file is given.
const SYNTHETIC_SAMPLES: usize = 60;
const SYNTHETIC_UIDS: usize = 20;
const SYNTHETIC_PROCESSES_PER_UID: usize = 4;

fn load_source(replay_file: Option<&Path>) -> Result<ReplayData, Box<dyn std::error::Error>> {
    match replay_file {
        Some(path) => Ok(load_replay_data(path)?),
        None => {
            info!(
                "No replay file given, serving {} synthetic samples",
                SYNTHETIC_SAMPLES
            );
            let mut rng = rand::thread_rng();
            Ok(generate_replay_data(
                &mut rng,
                SYNTHETIC_SAMPLES,
                SYNTHETIC_UIDS,
                SYNTHETIC_PROCESSES_PER_UID,
            ))
        }
    }
}

/// Builds the shared state and runs the startup collection sequence.
pub async fn build_state(
    config: ProfilerConfig,
    replay_file: Option<&Path>,
) -> Result<SharedState, Box<dyn std::error::Error>> {
    let registry = Registry::new();
    let profiler = PerformanceProfiler::with_registry(config.clone(), &registry)?;

    let scrape_duration = Gauge::with_opts(Opts::new(
        "herakles_perf_profiler_scrape_duration_seconds",
        "Duration of the previous /metrics request",
    ))?;
    registry.register(Box::new(scrape_duration.clone()))?;

    let source = ReplaySource::new(load_source(replay_file)?);

    let state = Arc::new(AppState {
        registry,
        profiler,
        source,
        config: Arc::new(config),
        scrape_duration,
        status: RwLock::new(CollectionStatus::default()),
        started_at: Instant::now(),
    });

    state.profiler.on_system_startup();
    let mut stats = ResourceStats::default();
    let result = state.profiler.on_boottime_collection(
        SystemTime::now(),
        &state.source,
        &state.source,
        Some(&mut stats),
    );
    if let Err(e) = &result {
        warn!("Boot-time collection failed: {}", e);
    } else {
        info!("Boot-time collection completed");
    }
    state.record_outcome(&result).await;
    state.profiler.on_watchdog_service_registered();

    Ok(state)
}

/// Runs one periodic collection against the next sample.
pub async fn periodic_collection(state: &AppState) {
    state.source.advance();
    let mut stats = ResourceStats::default();
    let result = state.profiler.on_periodic_collection(
        SystemTime::now(),
        SystemState::Normal,
        &state.source,
        &state.source,
        Some(&mut stats),
    );
    match &result {
        Ok(()) => debug!(sample = state.source.position(), "Periodic collection completed"),
        Err(e) => error!("Periodic collection failed: {}", e),
    }
    state.record_outcome(&result).await;

    if stats.resource_usage_stats.is_some() {
        state.status.write().await.resource_stats = stats;
    }
}

/// Builds the HTTP router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/dump", get(dump_handler))
        .route("/dump/custom", get(custom_dump_handler).delete(end_custom_handler))
        .route("/dump/proto", get(proto_dump_handler))
        .route("/resource-usage", get(resource_usage_handler))
        .route("/collect/wake-up", post(wake_up_handler))
        .route("/collect/user-switch", post(user_switch_handler))
        .route("/collect/custom", post(custom_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Runs the server until SIGINT or SIGTERM.
pub async fn run_server(
    config: ProfilerConfig,
    replay_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting herakles-perf-profiler");

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let sample_interval = Duration::from_secs(config.sample_interval_secs);
    let state = build_state(config, replay_file).await?;

    // Start background periodic collection task
    let bg_state = state.clone();
    let background_task = tokio::spawn(async move {
        let mut int = interval(sample_interval);
        int.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; boot-time collection covered it.
        int.tick().await;
        debug!(
            "Periodic collection task started with {}s interval",
            sample_interval.as_secs()
        );

        loop {
            int.tick().await;
            periodic_collection(&bg_state).await;
        }
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    let app = router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!("herakles-perf-profiler listening on http://{}", addr);

    // Start HTTP server with graceful shutdown capability
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    // Cleanup: cancel background task before exit
    background_task.abort();
    let _ = background_task.await;
    state.profiler.terminate();

    info!("herakles-perf-profiler stopped gracefully");
    Ok(())
}
