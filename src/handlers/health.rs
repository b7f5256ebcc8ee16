//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! collection status and cache occupancy.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use herakles_perf_profiler::CollectionKind;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::{CollectionStatus, SharedState};

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/herakles-io/herakles-perf-profiler — More info: https://www.herakles.io — Support: proc-mem@herakles.io";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let status = state.status.read().await.clone();

    // Healthy once a collection succeeded and the newest one did not fail
    let code = if status.last_success.is_some() && status.last_error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = match (&status.last_success, &status.last_error) {
        (_, Some(e)) => format!("Last collection failed: {e}"),
        (Some(_), None) => "OK".to_string(),
        (None, None) => "No collection yet".to_string(),
    };

    let counts: Vec<(CollectionKind, usize)> = CollectionKind::ALL
        .iter()
        .map(|kind| (*kind, state.profiler.record_count(*kind)))
        .collect();
    let latest_cpu_ms = state
        .profiler
        .latest_periodic_record()
        .map(|r| r.system_summary.total_cpu_time_ms);
    let table = render_health_table(
        &status,
        &counts,
        latest_cpu_ms,
        state.started_at.elapsed().as_secs(),
    );

    debug!("Health check: {} - {}", code, message);
    (
        code,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\n{table}\n{FOOTER_TEXT}"),
    )
}

/// Renders collection status and cache occupancy as a plain-text table.
pub fn render_health_table(
    status: &CollectionStatus,
    counts: &[(CollectionKind, usize)],
    latest_cpu_ms: Option<u64>,
    uptime_secs: u64,
) -> String {
    let mut out = String::new();
    writeln!(out, "COLLECTION STATUS").ok();
    writeln!(out, "=================").ok();
    writeln!(out).ok();
    writeln!(out, "{:25} | {:>12}", "Uptime (s)", uptime_secs).ok();
    writeln!(out, "{:25} | {:>12}", "Collections", status.total_collections).ok();
    writeln!(out, "{:25} | {:>12}", "Failed collections", status.failed_collections).ok();
    let last = status
        .last_success
        .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "never".to_string());
    writeln!(out, "{:25} | {:>12}", "Last success", last).ok();
    if let Some(cpu) = latest_cpu_ms {
        writeln!(out, "{:25} | {:>12}", "Latest CPU time (ms)", cpu).ok();
    }
    writeln!(out).ok();

    writeln!(out, "{:25} | {:>12}", "Collection", "Records").ok();
    writeln!(out, "{}", "-".repeat(40)).ok();
    for (kind, count) in counts {
        writeln!(out, "{:25} | {:>12}", kind.as_str(), count).ok();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_health_table() {
        let status = CollectionStatus {
            total_collections: 4,
            failed_collections: 1,
            ..Default::default()
        };
        let counts = [(CollectionKind::BootTime, 1), (CollectionKind::Periodic, 3)];
        let table = render_health_table(&status, &counts, Some(1_800), 42);

        assert!(table.contains("Uptime (s)                |           42"));
        assert!(table.contains("Failed collections        |            1"));
        assert!(table.contains("never"));
        assert!(table.contains("Latest CPU time (ms)      |         1800"));
        assert!(table.contains("boot_time                 |            1"));
        assert!(table.contains("periodic                  |            3"));
    }
}
