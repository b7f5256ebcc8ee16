//! Dump endpoint handlers.
//!
//! Text dumps use the same report the watchdog writes to its dump file
//! descriptor. The protobuf dump is the encoded `PerformanceProfilerDump`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herakles_perf_profiler::ProfilerError;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for dump endpoint failures.
#[derive(Debug)]
pub struct DumpError(ProfilerError);

impl From<ProfilerError> for DumpError {
    fn from(e: ProfilerError) -> Self {
        DumpError(e)
    }
}

impl IntoResponse for DumpError {
    fn into_response(self) -> Response {
        error!("Dump failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to dump collections: {}", self.0),
        )
            .into_response()
    }
}

/// Handler for the /dump endpoint.
#[instrument(skip(state))]
pub async fn dump_handler(State(state): State<SharedState>) -> Result<impl IntoResponse, DumpError> {
    debug!("Processing /dump request");
    let mut buffer = Vec::new();
    state.profiler.on_dump(&mut buffer)?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Handler for the /dump/custom endpoint.
#[instrument(skip(state))]
pub async fn custom_dump_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, DumpError> {
    debug!("Processing /dump/custom request");
    let mut buffer = Vec::new();
    state.profiler.on_custom_collection_dump(Some(&mut buffer))?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Handler for the /dump/proto endpoint.
#[instrument(skip(state))]
pub async fn proto_dump_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, DumpError> {
    debug!("Processing /dump/proto request");
    let mut buffer = Vec::new();
    state
        .profiler
        .on_dump_proto(&state.config.collection_intervals, &mut buffer)?;
    debug!("Encoded protobuf dump: {} bytes", buffer.len());
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/x-protobuf")],
        buffer,
    ))
}

/// Handler for the /resource-usage endpoint.
#[instrument(skip(state))]
pub async fn resource_usage_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing /resource-usage request");
    let status = state.status.read().await;
    match &status.resource_stats.resource_usage_stats {
        Some(stats) => Json(stats.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "No resource usage collected yet\n",
        )
            .into_response(),
    }
}
